// AICoder: Manifest Generation
// Derives dependency manifests from the planner's output so module projects
// ship installable: requirements.txt for Python, package.json + tsconfig.json
// for TypeScript. Web projects are written into an existing site that already
// owns its manifests, so they get none.

use std::collections::BTreeMap;

use crate::agents::planner::ProjectPlan;
use crate::config::OutputFormat;

/// Add the manifests the output format calls for, keyed off the plan's
/// dependency list. Files the coder already emitted are never overwritten.
pub fn add_manifests(
    files: &mut BTreeMap<String, String>,
    plan: Option<&ProjectPlan>,
    format: OutputFormat,
) {
    let Some(plan) = plan else {
        return;
    };

    match format {
        OutputFormat::Python => {
            files
                .entry("requirements.txt".to_string())
                .or_insert_with(|| requirements_txt(plan));
            log::info!("Generated requirements.txt from plan dependencies");
        }
        OutputFormat::Typescript => {
            files
                .entry("package.json".to_string())
                .or_insert_with(|| package_json(plan));
            files
                .entry("tsconfig.json".to_string())
                .or_insert_with(tsconfig_json);
            log::info!("Generated package.json and tsconfig.json from plan dependencies");
        }
        // The target site carries its own package.json and tsconfig.json.
        OutputFormat::Tsx => {}
    }
}

/// Extract a bare package name from a free-form plan line ("- express: for
/// routing" -> "express").
fn dependency_name(line: &str) -> Option<&str> {
    let trimmed = line
        .trim()
        .trim_start_matches(['-', '*', '•'])
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.')
        .trim();
    let name = trimmed.split([':', ' ', '(', ',']).next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

pub fn requirements_txt(plan: &ProjectPlan) -> String {
    let names: Vec<&str> = plan
        .dependencies
        .iter()
        .filter_map(|d| dependency_name(d))
        .collect();
    if names.is_empty() {
        return "# No specific dependencies identified\n".to_string();
    }

    let mut out = String::from("# Project Dependencies\n\n");
    for name in names {
        out.push_str(name);
        out.push('\n');
    }
    out
}

pub fn package_json(plan: &ProjectPlan) -> String {
    let mut dependencies = serde_json::Map::new();
    for dep in &plan.dependencies {
        if let Some(name) = dependency_name(dep) {
            dependencies.insert(name.to_string(), serde_json::json!("latest"));
        }
    }

    let package = serde_json::json!({
        "name": "generated-typescript-project",
        "version": "1.0.0",
        "description": "Generated TypeScript project",
        "main": "index.js",
        "scripts": {
            "build": "tsc",
            "start": "node index.js",
            "dev": "ts-node index.ts",
            "test": "jest"
        },
        "dependencies": dependencies,
        "devDependencies": {
            "typescript": "^5.0.0",
            "ts-node": "^10.9.0",
            "@types/node": "^20.0.0"
        }
    });
    serde_json::to_string_pretty(&package).unwrap_or_default()
}

pub fn tsconfig_json() -> String {
    let tsconfig = serde_json::json!({
        "compilerOptions": {
            "target": "ES2020",
            "module": "commonjs",
            "lib": ["ES2020"],
            "outDir": "./dist",
            "rootDir": "./",
            "strict": true,
            "esModuleInterop": true,
            "skipLibCheck": true,
            "forceConsistentCasingInFileNames": true,
            "resolveJsonModule": true,
            "declaration": true,
            "declarationMap": true,
            "sourceMap": true
        },
        "include": ["**/*.ts"],
        "exclude": ["node_modules", "dist"]
    });
    serde_json::to_string_pretty(&tsconfig).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with_deps(deps: &[&str]) -> ProjectPlan {
        ProjectPlan {
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn python_plans_get_requirements() {
        let mut files = BTreeMap::new();
        let plan = plan_with_deps(&["- flask: web framework", "requests"]);
        add_manifests(&mut files, Some(&plan), OutputFormat::Python);

        let requirements = &files["requirements.txt"];
        assert!(requirements.contains("flask\n"));
        assert!(requirements.contains("requests\n"));
        assert!(!files.contains_key("package.json"));
    }

    #[test]
    fn typescript_plans_get_package_and_tsconfig() {
        let mut files = BTreeMap::new();
        let plan = plan_with_deps(&["express", "- axios: http client"]);
        add_manifests(&mut files, Some(&plan), OutputFormat::Typescript);

        let package: serde_json::Value =
            serde_json::from_str(&files["package.json"]).unwrap();
        assert_eq!(package["dependencies"]["express"], "latest");
        assert_eq!(package["dependencies"]["axios"], "latest");
        assert_eq!(package["scripts"]["build"], "tsc");

        let tsconfig: serde_json::Value =
            serde_json::from_str(&files["tsconfig.json"]).unwrap();
        assert_eq!(tsconfig["compilerOptions"]["strict"], true);
    }

    #[test]
    fn web_projects_and_missing_plans_add_nothing() {
        let mut files = BTreeMap::new();
        add_manifests(&mut files, Some(&plan_with_deps(&["next"])), OutputFormat::Tsx);
        assert!(files.is_empty());

        add_manifests(&mut files, None, OutputFormat::Python);
        assert!(files.is_empty());
    }

    #[test]
    fn coder_emitted_manifests_are_kept() {
        let mut files = BTreeMap::new();
        files.insert("requirements.txt".to_string(), "flask==2.0\n".to_string());
        add_manifests(&mut files, Some(&plan_with_deps(&["django"])), OutputFormat::Python);
        assert_eq!(files["requirements.txt"], "flask==2.0\n");
    }

    #[test]
    fn empty_dependency_lists_still_yield_a_requirements_stub() {
        let plan = plan_with_deps(&[]);
        assert!(requirements_txt(&plan).starts_with("# No specific dependencies"));
    }
}
