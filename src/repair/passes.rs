// AICoder: Repair Passes
// Each pass is a pure string transform. Unmatched patterns are no-ops; no pass
// ever errors. Line-oriented passes skip comment lines so repairs never touch
// commented-out code.

use once_cell::sync::Lazy;
use regex::Regex;

use super::FileRole;

static PARAM_ANY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*:\s*any\s*\)").unwrap());
static PARAM_EMPTY_COLON: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*:\s*\)").unwrap());
static DESTRUCTURE_ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\}\s*:\s*\{\s*[^}]*\}\s*:\s*any\s*\)").unwrap());
static TRAILING_ANY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\}\s*:\s*any\s*\)").unwrap());
static OPEN_PAREN_COLON: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*:\s*").unwrap());
static COLON_CLOSE_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*:\s*\)").unwrap());

static JSX_TAG_SEMI: Lazy<Regex> = Lazy::new(|| Regex::new(r"<\s*(\w+)\s*;").unwrap());
static SEMI_TAG_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r";\s*(\w+)\s*>").unwrap());
static ATTR_TRAILING_SEMI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\w+)\s*=\s*["']([^"']*)["']\s*;"#).unwrap());
static SEMI_BEFORE_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#";\s*(\w+)\s*=\s*["']"#).unwrap());
static SELF_CLOSE_SEMI_HEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\s*(\w+)\s*;([^>]*)\s*/>").unwrap());
static SELF_CLOSE_SEMI_TAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\s*(\w+)([^>]*)\s*;\s*/>").unwrap());

static SEMI_FROM: Lazy<Regex> = Lazy::new(|| Regex::new(r";\s+from\s+").unwrap());
static BRACE_SEMI_FROM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\}\s*;\s*from\s+").unwrap());
static ANY_SEMI_FROM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*;\s*from\s+").unwrap());
static EXPORT_SEMI_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r";\s*\(").unwrap());
static FN_NAME_SEMI_PAREN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"function\s+(\w+)\s*;\s*\(").unwrap());

static USE_CLIENT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""use client"\s*\n?"#).unwrap());
static METADATA_EXPORT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"export const metadata\s*=\s*\{[^}]*\};?\n?").unwrap());
static LAYOUT_EXPORT_ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"export\s+default\s+function\s+(\w+)\s*\(\s*:\s*any\s*\)").unwrap());
static LAYOUT_EXPORT_EMPTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"export\s+default\s+function\s+(\w+)\s*\(\s*\)").unwrap());
static PAGE_EXPORT_ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"export\s+default\s+function\s+(\w+)\s*\(\s*:\s*any\s*\)").unwrap());

const METADATA_BLOCK: &str = "export const metadata = {\n  title: 'Generated App',\n  description: 'Generated by AICoder',\n}";

/// Keywords whose presence means a page genuinely needs client rendering.
pub const INTERACTIVE_KEYWORDS: [&str; 5] =
    ["useState", "useEffect", "onClick", "onChange", "addEventListener"];

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with("//") || trimmed.starts_with("/*")
}

fn for_each_line(content: &str, f: impl Fn(&str) -> String) -> String {
    content
        .split('\n')
        .map(f)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pass 1: collapse malformed function parameter lists. `(: any)` becomes `()`
/// and `}: any)` closes the destructured parameter, keeping the original
/// function name intact.
pub fn fix_function_syntax(content: &str) -> String {
    for_each_line(content, |line| {
        let mut fixed = line.to_string();

        if DESTRUCTURE_ANY.is_match(&fixed) {
            fixed = DESTRUCTURE_ANY
                .replace_all(&fixed, "}: { children: React.ReactNode })")
                .into_owned();
        }
        if TRAILING_ANY.is_match(&fixed) {
            fixed = TRAILING_ANY.replace_all(&fixed, ")").into_owned();
        }
        if PARAM_ANY.is_match(&fixed) {
            fixed = PARAM_ANY.replace_all(&fixed, "()").into_owned();
        }

        // Residual colon fragments inside parameter lists
        if fixed.contains("function") && fixed.contains('(') && fixed.contains(')') {
            fixed = OPEN_PAREN_COLON.replace_all(&fixed, "(").into_owned();
            fixed = COLON_CLOSE_PAREN.replace_all(&fixed, ")").into_owned();
        }

        fixed
    })
}

/// Pass 2: remove stray semicolons from JSX tag openers, attributes, and
/// self-closing tags. Comment, import, and export lines are left alone.
pub fn fix_jsx_syntax(content: &str) -> String {
    for_each_line(content, |line| {
        let trimmed = line.trim_start();
        if is_comment(trimmed) || trimmed.starts_with("import") || trimmed.starts_with("export") {
            return line.to_string();
        }

        let mut fixed = JSX_TAG_SEMI.replace_all(line, "<$1").into_owned();
        fixed = SEMI_TAG_CLOSE.replace_all(&fixed, "$1>").into_owned();
        fixed = ATTR_TRAILING_SEMI
            .replace_all(&fixed, "$1=\"$2\"")
            .into_owned();
        fixed = SEMI_BEFORE_ATTR.replace_all(&fixed, " $1=\"").into_owned();
        fixed = SELF_CLOSE_SEMI_HEAD
            .replace_all(&fixed, "<$1$2/>")
            .into_owned();
        fixed = SELF_CLOSE_SEMI_TAIL
            .replace_all(&fixed, "<$1$2/>")
            .into_owned();
        fixed
    })
}

/// Pass 3: remove semicolons that landed mid-statement in import and export
/// lines (`}; from './x'` -> `} from './x'`). Lines already ending in a
/// semicolon are considered well formed.
pub fn fix_import_export_syntax(content: &str) -> String {
    for_each_line(content, |line| {
        let trimmed = line.trim();

        if trimmed.starts_with("import") && trimmed.contains(';') && !trimmed.ends_with(';') {
            let mut fixed = BRACE_SEMI_FROM.replace_all(line, "} from ").into_owned();
            fixed = SEMI_FROM.replace_all(&fixed, " from ").into_owned();
            fixed = ANY_SEMI_FROM.replace_all(&fixed, " from ").into_owned();
            return fixed;
        }

        if trimmed.starts_with("export") && trimmed.contains(';') && !trimmed.ends_with(';') {
            let mut fixed = FN_NAME_SEMI_PAREN
                .replace_all(line, "function $1(")
                .into_owned();
            fixed = EXPORT_SEMI_PAREN.replace_all(&fixed, "(").into_owned();
            return fixed;
        }

        line.to_string()
    })
}

/// Pass 4: role-specific Next.js rules.
/// - layout: server component (no "use client"), metadata export required,
///   default export takes the `{ children }` destructure.
/// - page: "use client" only when an interactive keyword appears.
/// - any client component: no metadata export.
pub fn apply_role_rules(content: &str, role: FileRole) -> String {
    let mut content = content.to_string();

    match role {
        FileRole::RootLayout => {
            content = LAYOUT_EXPORT_ANY
                .replace_all(
                    &content,
                    "export default function $1({ children }: { children: React.ReactNode })",
                )
                .into_owned();
            content = LAYOUT_EXPORT_EMPTY
                .replace_all(
                    &content,
                    "export default function $1({ children }: { children: React.ReactNode })",
                )
                .into_owned();

            if content.contains("\"use client\"") {
                content = USE_CLIENT_LINE.replace_all(&content, "").into_owned();
                log::info!("Removed 'use client' from layout.tsx (must be server component)");
            }

            if !content.contains("export const metadata") {
                content = inject_after_imports(&content, METADATA_BLOCK);
                log::info!("Added metadata export to layout.tsx");
            }
        }
        FileRole::MainPage => {
            content = PAGE_EXPORT_ANY
                .replace_all(&content, "export default function $1()")
                .into_owned();

            if content.contains("\"use client\"") {
                let needs_client = INTERACTIVE_KEYWORDS.iter().any(|k| content.contains(k));
                if !needs_client {
                    content = USE_CLIENT_LINE.replace_all(&content, "").into_owned();
                    log::info!("Removed unnecessary 'use client' from page.tsx");
                }
            }
        }
        FileRole::Stylesheet | FileRole::Component | FileRole::Other => {}
    }

    // Client components must not export metadata, whatever their role.
    if content.contains("\"use client\"") && content.contains("export const metadata") {
        content = METADATA_EXPORT_BLOCK.replace_all(&content, "").into_owned();
        log::info!("Removed metadata export from a client component");
    }

    content
}

/// Pass 5: final cleanup catching residual instances of the earlier patterns.
pub fn final_cleanup(content: &str) -> String {
    for_each_line(content, |line| {
        let mut fixed = PARAM_ANY.replace_all(line, "()").into_owned();
        fixed = PARAM_EMPTY_COLON.replace_all(&fixed, "()").into_owned();

        fixed = JSX_TAG_SEMI.replace_all(&fixed, "<$1").into_owned();
        fixed = SEMI_TAG_CLOSE.replace_all(&fixed, "$1>").into_owned();

        let trimmed = fixed.trim().to_string();
        if (trimmed.starts_with("import") || trimmed.starts_with("export"))
            && trimmed.contains(';')
            && !trimmed.ends_with(';')
        {
            fixed = fixed.replace("; ", " ").replace(" ;", " ");
        }

        fixed
    })
}

/// Insert a block after the leading import section (the first blank line), or
/// prepend it when the content has no blank line at all.
pub fn inject_after_imports(content: &str, block: &str) -> String {
    match content.find("\n\n") {
        Some(idx) => format!("{}\n\n{}{}", &content[..idx], block, &content[idx..]),
        None => format!("{}\n\n{}", block, content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_any_parameter_lists() {
        let fixed = fix_function_syntax("export default function Home(: any) {");
        assert_eq!(fixed, "export default function Home() {");
    }

    #[test]
    fn closes_destructured_params_with_trailing_any() {
        let fixed =
            fix_function_syntax("function Layout({ children }: { children: React.ReactNode }: any) {");
        assert!(fixed.contains("}: { children: React.ReactNode })"));
        assert!(!fixed.contains(": any)"));
    }

    #[test]
    fn scrubs_jsx_semicolons_but_not_comments() {
        let fixed = fix_jsx_syntax("<Image; src=\"a.jpg\"; alt=\"x\" />");
        assert!(!fixed.contains("Image;"));
        assert!(!fixed.contains("\";"));

        let comment = "// <Image; src=\"a.jpg\" />";
        assert_eq!(fix_jsx_syntax(comment), comment);

        let import = "import { X }; from './x'";
        assert_eq!(fix_jsx_syntax(import), import);
    }

    #[test]
    fn normalizes_import_lines() {
        let fixed = fix_import_export_syntax("import { Header }; from './components/Header'");
        assert_eq!(fixed, "import { Header } from './components/Header'");

        // A well-terminated import is untouched.
        let ok = "import React from 'react';";
        assert_eq!(fix_import_export_syntax(ok), ok);
    }

    #[test]
    fn layout_gains_metadata_and_loses_use_client() {
        let input = "\"use client\"\nimport './globals.css'\n\nexport default function RootLayout() {\n  return <html>{}</html>\n}";
        let fixed = apply_role_rules(input, FileRole::RootLayout);
        assert!(!fixed.contains("use client"));
        assert!(fixed.contains("export const metadata"));
        assert!(fixed.contains("{ children }: { children: React.ReactNode }"));
    }

    #[test]
    fn static_page_drops_use_client() {
        let input = "\"use client\"\nexport default function Home() {\n  return <main>hi</main>\n}";
        let fixed = apply_role_rules(input, FileRole::MainPage);
        assert!(!fixed.contains("use client"));
    }

    #[test]
    fn interactive_page_keeps_use_client() {
        let input = "\"use client\"\nimport { useState } from 'react'\nexport default function Home() {\n  const [n] = useState(0)\n  return <button onClick={() => {}}>{n}</button>\n}";
        let fixed = apply_role_rules(input, FileRole::MainPage);
        assert!(fixed.contains("\"use client\""));
    }

    #[test]
    fn client_component_loses_metadata_export() {
        let input = "\"use client\"\nexport const metadata = {\n  title: 'X',\n}\nexport default function Widget() { return <div /> }";
        let fixed = apply_role_rules(input, FileRole::Component);
        assert!(!fixed.contains("export const metadata"));
        assert!(fixed.contains("\"use client\""));
    }
}
