use std::fmt;

use serde::{Deserialize, Serialize};

/// Editor language tag carried by every file record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Javascript,
    Jsx,
    Typescript,
    Tsx,
    Html,
    Css,
    Json,
    Markdown,
    Python,
    Java,
    Plaintext,
}

impl Language {
    /// Guesses the language of a file from its extension.
    pub fn from_file_name(name: &str) -> Self {
        let extension = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
            _ => return Language::Plaintext,
        };

        match extension.as_str() {
            "js" | "mjs" | "cjs" => Language::Javascript,
            "jsx" => Language::Jsx,
            "ts" | "mts" | "cts" => Language::Typescript,
            "tsx" => Language::Tsx,
            "html" | "htm" => Language::Html,
            "css" => Language::Css,
            "json" => Language::Json,
            "md" | "markdown" => Language::Markdown,
            "py" => Language::Python,
            "java" => Language::Java,
            _ => Language::Plaintext,
        }
    }

    /// The content-type hint stored alongside a file's blob.
    pub fn content_type(self) -> &'static str {
        match self {
            Language::Javascript | Language::Jsx => "application/javascript",
            Language::Typescript | Language::Tsx => "application/typescript",
            Language::Html => "text/html",
            Language::Css => "text/css",
            Language::Json => "application/json",
            Language::Markdown => "text/markdown",
            Language::Python => "text/x-python",
            Language::Java => "text/x-java",
            Language::Plaintext => blobfs::DEFAULT_CONTENT_TYPE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Javascript => "javascript",
            Language::Jsx => "jsx",
            Language::Typescript => "typescript",
            Language::Tsx => "tsx",
            Language::Html => "html",
            Language::Css => "css",
            Language::Json => "json",
            Language::Markdown => "markdown",
            Language::Python => "python",
            Language::Java => "java",
            Language::Plaintext => "plaintext",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
