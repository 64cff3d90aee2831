// AICoder: Text Repair Engine
// Ordered pure passes applied to fixpoint over LLM-generated source text. The
// engine never parses the language; every repair is a line- or pattern-level
// heuristic that is safe to run on already-correct code.

pub mod passes;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

pub use passes::INTERACTIVE_KEYWORDS;

/// How many full pass sequences to run before giving up on a fixpoint.
const MAX_PASSES: usize = 5;

/// Role a generated file plays in the output project, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    RootLayout,
    MainPage,
    Stylesheet,
    Component,
    Other,
}

impl FileRole {
    pub fn from_filename(filename: &str) -> Self {
        match filename {
            "layout.tsx" => FileRole::RootLayout,
            "page.tsx" => FileRole::MainPage,
            "globals.css" => FileRole::Stylesheet,
            _ if filename.starts_with("components/") && filename.ends_with(".tsx") => {
                FileRole::Component
            }
            _ => FileRole::Other,
        }
    }
}

static FRAMER_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s+\{[^}]*motion[^}]*\}\s+from\s+['"]framer-motion['"];?\n?"#).unwrap()
});
static MOTION_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<motion\.([^>]+)>").unwrap());
static MOTION_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</motion\.[^>]+>").unwrap());
static MOTION_PROPS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(initial|animate|transition)=\{[^}]*\}").unwrap());
static FN_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"function\s+(\w+)").unwrap());
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n\s*\n").unwrap());
static LEADING_BLANK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\n").unwrap());
static TRAILING_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)[ \t]+$").unwrap());
static CLASS_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bclass\s*=\s*["']([^"']*)["']"#).unwrap());
static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<img\s+([^>]*?)\s*/>").unwrap());

/// Animation libraries the generated project cannot depend on; their imports
/// are stripped outright.
const UNAVAILABLE_LIBS: [&str; 3] = ["react-spring", "react-transition-group", "lottie-react"];

/// Components the coder prompt treats as optional; imports and usages of any
/// that were not actually generated get pruned.
const OPTIONAL_COMPONENTS: [&str; 7] = [
    "Header",
    "Hero",
    "Features",
    "Testimonials",
    "Pricing",
    "Contact",
    "Footer",
];

/// The repair engine. Stateless; `repair` is pure and deterministic, and
/// reaches a fixpoint (repairing repaired output changes nothing).
pub struct RepairEngine;

impl RepairEngine {
    /// Run the ordered pass sequence to fixpoint, capped at `MAX_PASSES`
    /// iterations. Stylesheets pass through untouched.
    pub fn repair(content: &str, filename: &str) -> String {
        let role = FileRole::from_filename(filename);
        if role == FileRole::Stylesheet {
            return content.to_string();
        }

        let mut content = content.to_string();
        for pass_num in 0..MAX_PASSES {
            let before = content.clone();

            content = passes::fix_function_syntax(&content);
            content = passes::fix_jsx_syntax(&content);
            content = passes::fix_import_export_syntax(&content);
            content = passes::apply_role_rules(&content, role);
            content = passes::final_cleanup(&content);

            if content == before {
                log::debug!(
                    "Syntax correction of {} converged in {} pass(es)",
                    filename,
                    pass_num + 1
                );
                break;
            }
        }
        content
    }

    /// Full repair of one file: the fixpoint pass sequence plus the
    /// supplemental content fixes (alias rewriting, unavailable libraries,
    /// missing imports and exports).
    pub fn repair_file(content: &str, filename: &str) -> String {
        let mut content = Self::repair(content, filename);
        if FileRole::from_filename(filename) == FileRole::Stylesheet {
            return content;
        }

        content = Self::inject_use_client_for_class_components(&content);
        content = Self::rewrite_import_aliases(&content);
        content = Self::inject_react_import(&content);
        content = Self::inject_default_export(&content);
        content = Self::strip_unavailable_libraries(&content);

        // Role rules may apply again after the injections (a class component
        // just gained "use client", so a metadata export must go).
        content = passes::apply_role_rules(&content, FileRole::from_filename(filename));

        if filename.ends_with(".tsx") {
            content = Self::polish(&content);
        }
        content
    }

    /// Quality polish applied to TSX files after the structural repairs:
    /// trailing whitespace, `class=` attributes, images without alt text, and
    /// raw `<img>` tags (swapped for next/image). Idempotent like the passes.
    pub fn polish(content: &str) -> String {
        let mut content = TRAILING_WS.replace_all(content, "").into_owned();
        content = CLASS_ATTR
            .replace_all(&content, "className=\"$1\"")
            .into_owned();

        content = IMG_TAG
            .replace_all(&content, |caps: &regex::Captures| {
                let attrs = &caps[1];
                if attrs.contains("alt=") {
                    format!("<Image {} />", attrs)
                } else {
                    format!("<Image {} alt=\"\" />", attrs)
                }
            })
            .into_owned();
        if content.contains("<Image") && !content.contains("import Image") {
            content = inject_top_import(&content, "import Image from 'next/image'");
        }

        BLANK_RUN.replace_all(&content, "\n\n").into_owned()
    }

    /// Repair every file in a parsed response, then prune imports of
    /// components that were never generated.
    pub fn repair_all(files: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut repaired: BTreeMap<String, String> = files
            .iter()
            .map(|(name, content)| (name.clone(), Self::repair_file(content, name)))
            .collect();
        Self::prune_missing_components(&mut repaired);
        repaired
    }

    /// Class components are client components in the app router.
    pub fn inject_use_client_for_class_components(content: &str) -> String {
        if content.contains("class ")
            && content.contains("extends Component")
            && !content.contains("\"use client\"")
        {
            format!("\"use client\"\n\n{}", content)
        } else {
            content.to_string()
        }
    }

    /// Rewrite `@/` path aliases to relative imports; the generated project
    /// has no tsconfig path mapping.
    pub fn rewrite_import_aliases(content: &str) -> String {
        content
            .replace("@/components/", "./components/")
            .replace("@/app/", "./")
            .replace("@/", "./")
    }

    /// Add a React import when hooks are used without one.
    pub fn inject_react_import(content: &str) -> String {
        let uses_hooks = content.contains("useState") || content.contains("useEffect");
        if uses_hooks && !content.contains("import React") && !content.contains("import { ") {
            format!("import React from 'react'\n{}", content)
        } else {
            content.to_string()
        }
    }

    /// Promote the first named function to the default export when the file
    /// has none.
    pub fn inject_default_export(content: &str) -> String {
        if content.contains("export default") || !content.contains("function ") {
            return content.to_string();
        }
        match FN_NAME.captures(content) {
            Some(caps) => {
                let func_name = &caps[1];
                content.replace(
                    &format!("function {}", func_name),
                    &format!("export default function {}", func_name),
                )
            }
            None => content.to_string(),
        }
    }

    /// Strip imports of animation libraries the project cannot provide,
    /// rewriting framer-motion elements to plain transitions.
    pub fn strip_unavailable_libraries(content: &str) -> String {
        let mut content = content.to_string();

        if content.contains("framer-motion") {
            content = FRAMER_IMPORT.replace_all(&content, "").into_owned();
            content = MOTION_OPEN
                .replace_all(
                    &content,
                    "<div className=\"transition-all duration-300 ease-in-out $1\">",
                )
                .into_owned();
            content = MOTION_CLOSE.replace_all(&content, "</div>").into_owned();
            content = MOTION_PROPS.replace_all(&content, "").into_owned();
        }

        for lib in UNAVAILABLE_LIBS {
            let pattern = format!(r#"import\s+.*from\s+['"]{}['"];?\n?"#, lib);
            if let Ok(re) = Regex::new(&pattern) {
                content = re.replace_all(&content, "").into_owned();
            }
        }

        content
    }

    /// Remove imports and usages of optional components that were never
    /// generated. Operates on the whole file map so it can see which
    /// `components/*.tsx` files actually exist.
    pub fn prune_missing_components(files: &mut BTreeMap<String, String>) {
        let generated: Vec<String> = files
            .keys()
            .filter(|f| f.starts_with("components/") && f.ends_with(".tsx"))
            .map(|f| {
                f.trim_start_matches("components/")
                    .trim_end_matches(".tsx")
                    .to_string()
            })
            .collect();

        let Some(page) = files.get("page.tsx").cloned() else {
            return;
        };
        let mut content = page;

        for comp in OPTIONAL_COMPONENTS {
            if generated.iter().any(|g| g == comp) {
                continue;
            }
            content = Self::remove_component_references(&content, comp);
        }

        content = BLANK_RUN.replace_all(&content, "\n\n").into_owned();
        content = LEADING_BLANK.replace_all(&content, "").into_owned();
        files.insert("page.tsx".to_string(), content);
    }

    /// Remove the import line and every usage form of one component.
    /// Also used by the build-error auto-fixer for "Module not found".
    pub fn remove_component_references(content: &str, component: &str) -> String {
        let mut content = content.to_string();

        let patterns = [
            format!(
                r#"import\s+{comp}\s+from\s+['"]\./components/{comp}['"];?\n?"#,
                comp = component
            ),
            format!(r"<{}\s*/?>", component),
            format!(r"<{}\s+[^>]*/>", component),
            format!(r"(?s)<{comp}\s+[^>]*>.*?</{comp}>", comp = component),
        ];
        for pattern in patterns {
            if let Ok(re) = Regex::new(&pattern) {
                content = re.replace_all(&content, "").into_owned();
            }
        }

        content
    }
}

/// Insert an import at the top of the file, after a "use client" directive
/// when one is present (the directive must stay first).
fn inject_top_import(content: &str, import_line: &str) -> String {
    if let Some(rest) = content.strip_prefix("\"use client\"\n") {
        format!("\"use client\"\n{}\n{}", import_line, rest)
    } else {
        format!("{}\n{}", import_line, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_reaches_a_fixpoint() {
        let broken = "import { Header }; from './components/Header'\nexport default function Home(: any) {\n  return (\n    <main>\n      <Image; src=\"hero.jpg\"; alt=\"Hero\" />\n    </main>\n  )\n}";
        let once = RepairEngine::repair(broken, "page.tsx");
        let twice = RepairEngine::repair(&once, "page.tsx");
        assert_eq!(once, twice);
        assert!(once.contains("export default function Home()"));
        assert!(once.contains("import { Header } from './components/Header'"));
        assert!(!once.contains("Image;"));
    }

    #[test]
    fn stylesheets_pass_through_untouched() {
        let css = "body { color: red; }\n";
        assert_eq!(RepairEngine::repair_file(css, "globals.css"), css);
    }

    #[test]
    fn alias_rewrite_and_react_injection() {
        let content = "import Header from '@/components/Header'\n\nexport default function Home() {\n  const [n, setN] = useState(0)\n  return <Header />\n}";
        let fixed = RepairEngine::repair_file(content, "page.tsx");
        assert!(fixed.contains("'./components/Header'"));
        assert!(!fixed.contains("@/"));
    }

    #[test]
    fn default_export_injected_for_named_function() {
        let content = "function Home() {\n  return <main>hi</main>\n}";
        let fixed = RepairEngine::inject_default_export(content);
        assert!(fixed.starts_with("export default function Home()"));
    }

    #[test]
    fn framer_motion_usage_rewritten() {
        let content = "import { motion } from 'framer-motion'\n\nexport default function Home() {\n  return <motion.div>hi</motion.div>\n}";
        let fixed = RepairEngine::strip_unavailable_libraries(content);
        assert!(!fixed.contains("framer-motion"));
        assert!(!fixed.contains("<motion."));
        assert!(fixed.contains("transition-all"));
    }

    #[test]
    fn missing_optional_components_pruned_from_page() {
        let mut files = BTreeMap::new();
        files.insert(
            "page.tsx".to_string(),
            "import Header from './components/Header'\nimport Hero from './components/Hero'\n\nexport default function Home() {\n  return (\n    <main>\n      <Header />\n      <Hero />\n    </main>\n  )\n}"
                .to_string(),
        );
        files.insert(
            "components/Header.tsx".to_string(),
            "export default function Header() { return <header /> }".to_string(),
        );

        RepairEngine::prune_missing_components(&mut files);
        let page = &files["page.tsx"];
        assert!(page.contains("<Header />"));
        assert!(!page.contains("Hero"));
    }

    #[test]
    fn polish_strips_trailing_ws_and_fixes_class_attrs() {
        let content = "export default function Home() {  \n  return <div class=\"hero\">hi</div>\n}";
        let polished = RepairEngine::polish(content);
        assert!(polished.contains("function Home() {\n"));
        assert!(polished.contains("className=\"hero\""));
        assert!(!polished.contains("class=\"hero\""));
        // Idempotent: polishing polished output changes nothing.
        assert_eq!(RepairEngine::polish(&polished), polished);
    }

    #[test]
    fn img_tags_become_next_image_with_alt() {
        let content = "export default function Home() {\n  return <img src=\"hero.jpg\" />\n}";
        let polished = RepairEngine::polish(content);
        assert!(polished.starts_with("import Image from 'next/image'"));
        assert!(polished.contains("<Image src=\"hero.jpg\" alt=\"\" />"));
        assert!(!polished.contains("<img"));
    }

    #[test]
    fn next_image_import_lands_after_use_client() {
        let content = "\"use client\"\nexport default function Gallery() {\n  return <img src=\"a.jpg\" alt=\"a\" onClick={zoom} />\n}";
        let polished = RepairEngine::polish(content);
        assert!(polished.starts_with("\"use client\"\nimport Image from 'next/image'"));
        assert!(polished.contains("<Image src=\"a.jpg\" alt=\"a\" onClick={zoom} />"));
    }

    #[test]
    fn class_component_gains_use_client_and_drops_metadata() {
        let content = "import React, { Component } from 'react'\n\nexport const metadata = {\n  title: 'X',\n}\n\nclass Counter extends Component {\n  render() { return <div /> }\n}\nexport default Counter";
        let fixed = RepairEngine::repair_file(content, "components/Counter.tsx");
        assert!(fixed.starts_with("\"use client\""));
        assert!(!fixed.contains("export const metadata"));
    }
}
