//! Projects: the owner-scoped container for a tree of nodes.

use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    files::FileService,
    node::ProjectId,
    store::{Documents, StoreError},
};

/// Starter layout a project was created from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Template {
    #[default]
    React,
    ReactTs,
    Vanilla,
    VanillaTs,
    Vue,
    VueTs,
    Angular,
    Svelte,
    Node,
}

impl Template {
    pub const ALL: [Template; 9] = [
        Template::React,
        Template::ReactTs,
        Template::Vanilla,
        Template::VanillaTs,
        Template::Vue,
        Template::VueTs,
        Template::Angular,
        Template::Svelte,
        Template::Node,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Template::React => "react",
            Template::ReactTs => "react-ts",
            Template::Vanilla => "vanilla",
            Template::VanillaTs => "vanilla-ts",
            Template::Vue => "vue",
            Template::VueTs => "vue-ts",
            Template::Angular => "angular",
            Template::Svelte => "svelte",
            Template::Node => "node",
        }
    }

    /// The framework a template implies.
    pub fn framework(self) -> Framework {
        match self {
            Template::React | Template::ReactTs => Framework::React,
            Template::Vue | Template::VueTs => Framework::Vue,
            Template::Angular => Framework::Angular,
            _ => Framework::Vanilla,
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Template {
    type Err = TemplateParseError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Template::ALL
            .into_iter()
            .find(|template| template.as_str() == source)
            .ok_or_else(|| TemplateParseError {
                attempted: source.to_owned(),
            })
    }
}

#[derive(Debug, Error)]
#[error(
    "Invalid template '{attempted}'. Valid values are: react, react-ts, vanilla, vanilla-ts, \
     vue, vue-ts, angular, svelte, node"
)]
pub struct TemplateParseError {
    attempted: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    #[default]
    React,
    Vue,
    Angular,
    Vanilla,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    #[serde(default)]
    pub template: Template,

    #[serde(default)]
    pub framework: Framework,

    #[serde(default = "default_true")]
    pub auto_save: bool,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            template: Template::default(),
            framework: Framework::default(),
            auto_save: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub owner: String,
    pub name: String,
    pub slug: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub settings: ProjectSettings,
}

impl Project {
    /// Fails with `Unauthorized` unless `user` owns this project.
    pub fn ensure_owner(&self, user: &str) -> Result<(), StoreError> {
        if self.owner == user {
            Ok(())
        } else {
            Err(StoreError::Unauthorized {
                user: user.to_owned(),
                project: self.id,
            })
        }
    }
}

/// Turns a display name into a URL-friendly slug: lowercased, with runs of
/// whitespace replaced by a single `-`.
pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Parameters for [`ProjectService::create`].
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub id: Option<ProjectId>,
    pub name: String,
    pub slug: Option<String>,
    pub description: String,
    pub template: Template,
}

/// Create, look up and delete projects.
#[derive(Clone)]
pub struct ProjectService {
    documents: Arc<Documents>,
}

impl ProjectService {
    pub fn new(documents: Arc<Documents>) -> Self {
        Self { documents }
    }

    pub fn create(&self, owner: &str, new: NewProject) -> Result<Project, StoreError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(StoreError::Invalid("project name is empty".to_owned()));
        }

        let slug = match new.slug {
            Some(slug) => slugify(&slug),
            None => slugify(name),
        };

        if slug.is_empty() {
            return Err(StoreError::Invalid("project slug is empty".to_owned()));
        }

        if self.documents.projects().iter().any(|p| p.slug == slug) {
            return Err(StoreError::Conflict(format!(
                "a project with slug '{}' already exists",
                slug
            )));
        }

        let project = Project {
            id: new.id.unwrap_or_else(ProjectId::new),
            owner: owner.to_owned(),
            name: name.to_owned(),
            slug,
            description: new.description,
            settings: ProjectSettings {
                template: new.template,
                framework: new.template.framework(),
                auto_save: true,
            },
        };

        self.documents.insert_project(project.clone())?;
        log::info!("Created project '{}' ({})", project.name, project.id);

        Ok(project)
    }

    pub fn get(&self, id: ProjectId) -> Result<Project, StoreError> {
        self.documents
            .project(id)
            .ok_or_else(|| StoreError::not_found(format!("project {}", id)))
    }

    /// Like `get`, but also checks that `user` owns the project.
    pub fn get_owned(&self, id: ProjectId, user: &str) -> Result<Project, StoreError> {
        let project = self.get(id)?;
        project.ensure_owner(user)?;
        Ok(project)
    }

    pub fn list_for_owner(&self, owner: &str) -> Vec<Project> {
        self.documents
            .projects()
            .into_iter()
            .filter(|project| project.owner == owner)
            .collect()
    }

    /// Deletes a project together with every file and folder it contains.
    pub fn delete(&self, id: ProjectId, user: &str, files: &FileService) -> Result<(), StoreError> {
        let project = self.get_owned(id, user)?;

        let removed = files.delete_project_files(project.id)?;
        self.documents.remove_project(project.id)?;

        log::info!(
            "Deleted project '{}' and {} node(s)",
            project.name,
            removed.len()
        );

        Ok(())
    }
}
