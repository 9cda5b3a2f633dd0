//! Starter files for new projects.

use crate::{project::Template, snapshot::DesiredSnapshot};

const INDEX_JS: &str = "\
import { StrictMode } from 'react'
import { createRoot } from 'react-dom/client'
import './styles.css'
import App from './App.js'

createRoot(document.getElementById('root')).render(
  <StrictMode>
    <App />
  </StrictMode>,
)";

const STYLES_CSS: &str = "\
.App {
  font-family: sans-serif;
  text-align: center;
  padding: 20px;
}

h1 {
  color: #333;
}

p {
  color: #666;
}";

/// The files a freshly created project starts with, or `None` when the
/// template has no built-in starter and the editing surface brings its own.
pub fn starter_files(template: Template, project_name: &str) -> Option<DesiredSnapshot> {
    match template {
        Template::React => Some(react(project_name)),
        _ => None,
    }
}

fn react(project_name: &str) -> DesiredSnapshot {
    DesiredSnapshot::new()
        .with("/index.html", index_html(project_name))
        .with("/index.js", INDEX_JS)
        .with("/App.js", app_js(project_name))
        .with("/styles.css", STYLES_CSS)
        .with("/package.json", package_json(project_name))
}

fn index_html(project_name: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>{project_name}</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/index.js"></script>
  </body>
</html>"#
    )
}

fn app_js(project_name: &str) -> String {
    format!(
        r#"export default function App() {{
  return (
    <div className="App">
      <h1>Welcome to {project_name}!</h1>
      <p>Start editing to see changes!</p>
    </div>
  );
}}"#
    )
}

fn package_json(project_name: &str) -> String {
    let manifest = serde_json::json!({
        "name": crate::project::slugify(project_name),
        "version": "1.0.0",
        "type": "module",
        "dependencies": {
            "react": "^18.2.0",
            "react-dom": "^18.2.0",
        },
    });

    serde_json::to_string_pretty(&manifest).unwrap_or_default()
}
