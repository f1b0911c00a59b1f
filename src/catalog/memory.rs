//! In-memory catalog.
//!
//! Holds all records locally and counts calls per operation. Used for offline
//! operation (seeded from a JSON snapshot) and in tests, where failures can be
//! injected per operation.

use std::cell::{Cell, RefCell};
use std::path::Path;

use serde::Deserialize;

use super::{
    Catalog, CatalogError, CatalogResult, NewParameter, NewTemplate, Parameter, ParameterTemplate,
    PartCategory, Pk,
};

/// Number of calls made per catalog operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `list_templates` calls.
    pub list_templates: usize,
    /// `create_template` calls.
    pub create_template: usize,
    /// `list_parameters` calls.
    pub list_parameters: usize,
    /// `create_parameter` calls.
    pub create_parameter: usize,
    /// `update_parameter` calls.
    pub update_parameter: usize,
    /// `list_categories` calls.
    pub list_categories: usize,
}

impl CallCounts {
    /// Total calls of every kind.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.list_templates
            + self.create_template
            + self.list_parameters
            + self.create_parameter
            + self.update_parameter
            + self.list_categories
    }
}

/// Serialised catalog content.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Records {
    #[serde(default)]
    categories: Vec<PartCategory>,
    #[serde(default)]
    templates: Vec<ParameterTemplate>,
    #[serde(default)]
    parameters: Vec<Parameter>,
}

/// A [`Catalog`] whose records live in memory.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    records: RefCell<Records>,
    calls: Cell<CallCounts>,
    failing: Cell<Option<&'static str>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a catalog from a JSON snapshot with `categories`, `templates`
    /// and `parameters` arrays (all optional).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| CatalogError::SnapshotRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let records: Records =
            serde_json::from_str(&contents).map_err(|e| CatalogError::SnapshotParse {
                path: path.to_path_buf(),
                source: e,
            })?;

        tracing::debug!(
            path = %path.display(),
            categories = records.categories.len(),
            templates = records.templates.len(),
            parameters = records.parameters.len(),
            "Loaded catalog snapshot"
        );

        Ok(Self {
            records: RefCell::new(records),
            ..Self::default()
        })
    }

    /// Adds a category and returns its primary key.
    pub fn add_category(&self, name: impl Into<String>) -> Pk {
        let mut records = self.records.borrow_mut();
        let pk = next_pk(records.categories.iter().map(|c| c.pk));
        records.categories.push(PartCategory {
            pk,
            name: name.into(),
        });
        pk
    }

    /// Adds a template and returns its primary key.
    pub fn add_template(&self, name: impl Into<String>, units: impl Into<String>) -> Pk {
        let mut records = self.records.borrow_mut();
        let pk = next_pk(records.templates.iter().map(|t| t.pk));
        records.templates.push(ParameterTemplate {
            pk,
            name: name.into(),
            units: units.into(),
        });
        pk
    }

    /// Adds a parameter and returns its primary key.
    pub fn add_parameter(&self, part: Pk, template: Pk, data: impl Into<String>) -> Pk {
        let mut records = self.records.borrow_mut();
        let pk = next_pk(records.parameters.iter().map(|p| p.pk));
        records.parameters.push(Parameter {
            pk,
            part,
            template,
            data: data.into(),
        });
        pk
    }

    /// Current templates (does not count as a call).
    #[must_use]
    pub fn templates(&self) -> Vec<ParameterTemplate> {
        self.records.borrow().templates.clone()
    }

    /// Current parameters (does not count as a call).
    #[must_use]
    pub fn parameters(&self) -> Vec<Parameter> {
        self.records.borrow().parameters.clone()
    }

    /// Calls made so far.
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        self.calls.get()
    }

    /// Makes every later call to `operation` fail, or clears the failure with `None`.
    pub fn fail_on(&self, operation: Option<&'static str>) {
        self.failing.set(operation);
    }

    fn enter(
        &self,
        operation: &'static str,
        bump: impl FnOnce(&mut CallCounts),
    ) -> CatalogResult<()> {
        let mut calls = self.calls.get();
        bump(&mut calls);
        self.calls.set(calls);

        if self.failing.get() == Some(operation) {
            return Err(CatalogError::request(
                operation,
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "catalog unavailable"),
            ));
        }
        Ok(())
    }
}

fn next_pk(existing: impl Iterator<Item = Pk>) -> Pk {
    existing.max().map_or(1, |pk| pk + 1)
}

impl Catalog for InMemoryCatalog {
    fn list_templates(&self) -> CatalogResult<Vec<ParameterTemplate>> {
        self.enter("list_templates", |c| c.list_templates += 1)?;
        Ok(self.records.borrow().templates.clone())
    }

    fn create_template(&self, template: &NewTemplate) -> CatalogResult<ParameterTemplate> {
        self.enter("create_template", |c| c.create_template += 1)?;
        let pk = self.add_template(template.name.clone(), template.units.clone());
        Ok(ParameterTemplate {
            pk,
            name: template.name.clone(),
            units: template.units.clone(),
        })
    }

    fn list_parameters(&self) -> CatalogResult<Vec<Parameter>> {
        self.enter("list_parameters", |c| c.list_parameters += 1)?;
        Ok(self.records.borrow().parameters.clone())
    }

    fn create_parameter(&self, parameter: &NewParameter) -> CatalogResult<Parameter> {
        self.enter("create_parameter", |c| c.create_parameter += 1)?;
        let pk = self.add_parameter(parameter.part, parameter.template, parameter.data.clone());
        Ok(Parameter {
            pk,
            part: parameter.part,
            template: parameter.template,
            data: parameter.data.clone(),
        })
    }

    fn update_parameter(&self, pk: Pk, data: &str) -> CatalogResult<Parameter> {
        self.enter("update_parameter", |c| c.update_parameter += 1)?;
        let mut records = self.records.borrow_mut();
        let parameter = records
            .parameters
            .iter_mut()
            .find(|p| p.pk == pk)
            .ok_or_else(|| {
                CatalogError::request(
                    "update_parameter",
                    format!("parameter {pk} does not exist"),
                )
            })?;
        parameter.data = data.to_string();
        Ok(parameter.clone())
    }

    fn list_categories(&self) -> CatalogResult<Vec<PartCategory>> {
        self.enter("list_categories", |c| c.list_categories += 1)?;
        Ok(self.records.borrow().categories.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pks_increase() {
        let catalog = InMemoryCatalog::new();
        assert_eq!(catalog.add_template("A", ""), 1);
        assert_eq!(catalog.add_template("B", ""), 2);
        assert_eq!(catalog.add_category("Parts"), 1);
    }

    #[test]
    fn calls_are_counted() {
        let catalog = InMemoryCatalog::new();
        catalog.list_templates().unwrap();
        catalog.list_templates().unwrap();
        catalog.list_parameters().unwrap();
        let calls = catalog.calls();
        assert_eq!(calls.list_templates, 2);
        assert_eq!(calls.list_parameters, 1);
        assert_eq!(calls.total(), 3);
    }

    #[test]
    fn injected_failure() {
        let catalog = InMemoryCatalog::new();
        catalog.fail_on(Some("list_categories"));
        assert!(matches!(
            catalog.list_categories(),
            Err(CatalogError::Request {
                operation: "list_categories",
                ..
            })
        ));
        catalog.fail_on(None);
        assert!(catalog.list_categories().is_ok());
    }

    #[test]
    fn update_missing_parameter_fails() {
        let catalog = InMemoryCatalog::new();
        assert!(catalog.update_parameter(7, "x").is_err());
    }

    #[test]
    fn open_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{
                "categories": [{"pk": 4, "name": "Mechanical"}],
                "templates": [{"pk": 9, "name": "Colour"}]
            }"#,
        )
        .unwrap();

        let catalog = InMemoryCatalog::open(&path).unwrap();
        assert_eq!(catalog.list_categories().unwrap()[0].pk, 4);
        assert_eq!(catalog.templates()[0].units, "");
        assert_eq!(catalog.add_template("Next", ""), 10);
    }
}
