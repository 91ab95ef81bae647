use std::path::Path;

use super::nodes::{Relationship, TypeTarget};
use super::Model;

/// Errors that can occur when loading a model graph.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read model: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid model JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{owner} refers to {handle}, which does not exist")]
    DanglingHandle { owner: String, handle: String },
}

impl Model {
    /// Parse a linked model graph from JSON and check every handle.
    pub fn from_json(content: &str) -> Result<Model, ModelError> {
        let mut model: Model = serde_json::from_str(content)?;
        model.check_links()?;
        model.number_expressions();
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Model, ModelError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Verify that every handle points inside its arena, so that the
    /// analyzer can index without bounds failures.
    fn check_links(&self) -> Result<(), ModelError> {
        let links = Links;

        for (i, ctx) in self.contexts.iter().enumerate() {
            let owner = format!("bounded context '{}' (#{})", ctx.name, i);
            links.all(&owner, &ctx.aggregates, self.aggregates.len())?;
            links.all(&owner, &ctx.modules, self.modules.len())?;
            links.all(&owner, &ctx.anti_corruptions, self.anti_corruptions.len())?;
            links.all(&owner, &ctx.realizes, self.contexts.len())?;
            links.opt(&owner, ctx.owner, self.contexts.len())?;
        }
        for module in &self.modules {
            links.all(&module.name, &module.aggregates, self.aggregates.len())?;
        }
        for agg in &self.aggregates {
            let owner = format!("aggregate '{}'", agg.name);
            links.opt(&owner, agg.context, self.contexts.len())?;
            links.all(&owner, &agg.objects, self.objects.len())?;
        }
        for obj in &self.objects {
            let owner = format!("domain object '{}'", obj.name);
            links.one(&owner, obj.aggregate, self.aggregates.len())?;
            links.all(&owner, &obj.attributes, self.attributes.len())?;
            links.all(&owner, &obj.references, self.references.len())?;
            if let Some(data) = obj.entity() {
                if let Some(mapping) = &data.mapping {
                    links.opt(&owner, mapping.entity, self.objects.len())?;
                    for alias in &mapping.aliases {
                        links.all(&owner, &alias.references, self.references.len())?;
                    }
                    for attr in &mapping.attributes {
                        links.all(&owner, &attr.path.references, self.references.len())?;
                    }
                }
                if let Some(uses) = &data.uses {
                    links.opt(&owner, uses.bounded_context, self.contexts.len())?;
                    links.opt(&owner, uses.aggregate, self.aggregates.len())?;
                    links.opt(&owner, uses.value_object, self.objects.len())?;
                }
            }
            let constructor = obj
                .constructor
                .iter()
                .flat_map(|c| c.parameters.iter().map(|p| &p.ty));
            let operations = obj.operations.iter().flat_map(|o| {
                o.parameters.iter().map(|p| &p.ty).chain(o.return_type.iter())
            });
            let queries = obj
                .repository
                .iter()
                .flat_map(|r| r.operations.iter())
                .flat_map(|o| o.parameters.iter().map(|p| &p.ty).chain(o.return_type.iter()));
            for ty in constructor.chain(operations).chain(queries) {
                if let TypeTarget::DomainObject(target) = ty.target {
                    links.opt(&owner, target, self.objects.len())?;
                }
            }
        }
        for attr in &self.attributes {
            links.one(&format!("attribute '{}'", attr.name), attr.owner, self.objects.len())?;
        }
        for r in &self.references {
            let owner = format!("reference '{}'", r.name);
            links.one(&owner, r.owner, self.objects.len())?;
            links.opt(&owner, r.target, self.objects.len())?;
        }
        for ac in &self.anti_corruptions {
            let owner = format!("anti-corruption '{}'", ac.name);
            links.one(&owner, ac.owner, self.contexts.len())?;
            links.opt(&owner, ac.bounded_context, self.contexts.len())?;
            links.opt(&owner, ac.aggregate, self.aggregates.len())?;
            for t in &ac.attributes {
                links.opt(&owner, t.entity, self.objects.len())?;
                links.opt(&owner, t.attribute, self.attributes.len())?;
            }
        }
        for map in &self.context_maps {
            let owner = format!("context map '{}'", map.name);
            links.all(&owner, &map.contexts, self.contexts.len())?;
            links.all(&owner, &map.relationships, self.relationships.len())?;
        }
        for (i, rel) in self.relationships.iter().enumerate() {
            let owner = format!("relationship #{}", i);
            let (a, b) = rel.participants();
            links.opt(&owner, a, self.contexts.len())?;
            links.opt(&owner, b, self.contexts.len())?;
            if let Relationship::UpstreamDownstream {
                exposed_aggregates, ..
            } = rel
            {
                links.all(&owner, exposed_aggregates, self.aggregates.len())?;
            }
        }
        Ok(())
    }
}

trait Handle: Copy + std::fmt::Display {
    fn slot(self) -> usize;
}

macro_rules! impl_handle {
    ($($id:ty),*) => {
        $(impl Handle for $id {
            fn slot(self) -> usize {
                self.index()
            }
        })*
    };
}

impl_handle!(
    cml_common::ContextId,
    cml_common::ModuleId,
    cml_common::AggregateId,
    cml_common::ObjectId,
    cml_common::AttributeId,
    cml_common::ReferenceId,
    cml_common::AntiCorruptionId,
    cml_common::RelationshipId
);

struct Links;

impl Links {
    fn one<H: Handle>(&self, owner: &str, handle: H, len: usize) -> Result<(), ModelError> {
        if handle.slot() < len {
            Ok(())
        } else {
            Err(ModelError::DanglingHandle {
                owner: owner.to_string(),
                handle: handle.to_string(),
            })
        }
    }

    fn opt<H: Handle>(&self, owner: &str, handle: Option<H>, len: usize) -> Result<(), ModelError> {
        match handle {
            Some(h) => self.one(owner, h, len),
            None => Ok(()),
        }
    }

    fn all<H: Handle>(&self, owner: &str, handles: &[H], len: usize) -> Result<(), ModelError> {
        handles.iter().try_for_each(|&h| self.one(owner, h, len))
    }
}
