// AICoder: Response Parser
// Splits a coder response into named files on `// <name>.<ext>` marker lines
// and backfills the files a web project cannot ship without.

use std::collections::BTreeMap;

use crate::config::OutputFormat;

/// Extensions a file marker line may carry.
const MARKER_EXTENSIONS: [&str; 3] = [".tsx", ".css", ".js"];

/// Canonical root layout used when the coder does not emit one.
pub const DEFAULT_LAYOUT: &str = r#"import type { Metadata } from 'next'
import { Inter } from 'next/font/google'
import './globals.css'

const inter = Inter({ subsets: ['latin'] })

export const metadata: Metadata = {
  title: 'Generated App',
  description: 'Generated by AICoder',
}

export default function RootLayout({
  children,
}: {
  children: React.ReactNode
}) {
  return (
    <html lang="en">
      <body className={inter.className}>{children}</body>
    </html>
  )
}"#;

/// Canonical stylesheet used when the coder does not emit one.
pub const DEFAULT_GLOBALS: &str = r#"@tailwind base;
@tailwind components;
@tailwind utilities;

:root {
  --foreground-rgb: 0, 0, 0;
  --background-start-rgb: 214, 219, 220;
  --background-end-rgb: 255, 255, 255;
}

@media (prefers-color-scheme: dark) {
  :root {
    --foreground-rgb: 255, 255, 255;
    --background-start-rgb: 0, 0, 0;
    --background-end-rgb: 0, 0, 0;
  }
}

body {
  color: rgb(var(--foreground-rgb));
  background: linear-gradient(
      to bottom,
      transparent,
      rgb(var(--background-end-rgb))
    )
    rgb(var(--background-start-rgb));
}"#;

/// True when a trimmed line is a file marker: `// <name>.<ext>`.
fn marker_filename(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let rest = trimmed.strip_prefix("// ")?;
    let candidate = rest.trim();
    if candidate.is_empty() || candidate.contains(char::is_whitespace) {
        return None;
    }
    if MARKER_EXTENSIONS.iter().any(|ext| candidate.ends_with(ext)) {
        Some(candidate)
    } else {
        None
    }
}

/// Split an LLM response into filename -> content. Every line after a marker
/// belongs to that file until the next marker; bodies are trimmed. A response
/// with no markers becomes the single default file for the output format. In
/// web mode the required layout and stylesheet are backfilled with canonical
/// defaults when absent.
pub fn parse_response(blob: &str, format: OutputFormat) -> BTreeMap<String, String> {
    let mut files: BTreeMap<String, String> = BTreeMap::new();

    let mut current: Option<(String, Vec<&str>)> = None;
    for line in blob.lines() {
        if let Some(filename) = marker_filename(line) {
            if let Some((name, body)) = current.take() {
                files.insert(name, body.join("\n").trim().to_string());
            }
            current = Some((filename.to_string(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((name, body)) = current.take() {
        files.insert(name, body.join("\n").trim().to_string());
    }

    if files.is_empty() {
        files.insert(
            format.default_filename().to_string(),
            blob.trim().to_string(),
        );
    }

    if format.is_web_project() {
        if !files.contains_key("layout.tsx") {
            files.insert("layout.tsx".to_string(), DEFAULT_LAYOUT.to_string());
            log::info!("Created default layout.tsx (required file)");
        }
        if !files.contains_key("globals.css") {
            files.insert("globals.css".to_string(), DEFAULT_GLOBALS.to_string());
            log::info!("Created default globals.css (required file)");
        }

        let optional: Vec<&String> = files
            .keys()
            .filter(|f| !format.required_files().contains(&f.as_str()))
            .collect();
        if optional.is_empty() {
            log::info!("No optional components generated");
        } else {
            log::info!("Generated {} optional component(s): {:?}", optional.len(), optional);
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_marker_lines() {
        let blob = "// page.tsx\nexport default function Home() {\n  return <main>hi</main>\n}\n\n// components/Header.tsx\nexport default function Header() {\n  return <header />\n}\n\n// globals.css\nbody { margin: 0; }";
        let files = parse_response(blob, OutputFormat::Tsx);

        assert_eq!(files["page.tsx"], "export default function Home() {\n  return <main>hi</main>\n}");
        assert!(files["components/Header.tsx"].contains("function Header"));
        assert_eq!(files["globals.css"], "body { margin: 0; }");
        // layout.tsx was not emitted, so the canonical default fills in.
        assert_eq!(files["layout.tsx"], DEFAULT_LAYOUT);
    }

    #[test]
    fn no_markers_yields_single_default_file() {
        let blob = "export default function Home() {\n  return <main>solo</main>\n}";
        let files = parse_response(blob, OutputFormat::Tsx);
        assert_eq!(files["page.tsx"], blob);
        assert!(files.contains_key("layout.tsx"));
        assert!(files.contains_key("globals.css"));

        let module = parse_response("print('hi')", OutputFormat::Python);
        assert_eq!(module.len(), 1);
        assert_eq!(module["main.py"], "print('hi')");
    }

    #[test]
    fn ordinary_comments_are_not_markers() {
        let blob = "// page.tsx\n// renders the landing page\nexport default function Home() {\n  return <main />\n}";
        let files = parse_response(blob, OutputFormat::Tsx);
        assert!(files["page.tsx"].starts_with("// renders the landing page"));
        assert_eq!(
            files
                .keys()
                .filter(|k| k.as_str() != "layout.tsx" && k.as_str() != "globals.css")
                .count(),
            1
        );
    }

    #[test]
    fn parse_round_trip_preserves_bodies() {
        let mut original = BTreeMap::new();
        original.insert("page.tsx".to_string(), "export default function Home() {\n  return <main />\n}".to_string());
        original.insert("layout.tsx".to_string(), DEFAULT_LAYOUT.to_string());
        original.insert("globals.css".to_string(), DEFAULT_GLOBALS.to_string());

        let blob = original
            .iter()
            .map(|(name, body)| format!("// {}\n{}", name, body))
            .collect::<Vec<_>>()
            .join("\n");

        let parsed = parse_response(&blob, OutputFormat::Tsx);
        assert_eq!(parsed, original);
    }
}
