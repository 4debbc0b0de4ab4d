use anyhow::{bail, Result};

/// Kind of a dataset field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Input of the network.
    Input,

    /// Ground truth of the network.
    GroundTruth,

    /// Additional data stored along with a sample.
    Additional,
}

/// Fields of the training dataset declared by an environment in
/// [`Environment::init_database`](super::Environment::init_database).
///
/// When no field is declared, any additional field is accepted.
#[derive(Debug, Clone, Default)]
pub struct DatabaseFields {
    fields: Vec<(String, FieldKind)>,
}

impl DatabaseFields {
    /// Declares a field.
    pub fn create_field(&mut self, name: impl Into<String>, kind: FieldKind) -> Result<()> {
        let name = name.into();
        if self.fields.iter().any(|(n, _)| *n == name) {
            bail!("field '{}' is already declared", name);
        }
        self.fields.push((name, kind));
        Ok(())
    }

    /// Returns the kind of a declared field.
    pub fn kind(&self, name: &str) -> Option<FieldKind> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, k)| *k)
    }

    /// Returns `true` if no field is declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Declared fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &(String, FieldKind)> {
        self.fields.iter()
    }

    /// Checks that an additional field may be written.
    pub(crate) fn check_additional(&self, name: &str) -> Result<()> {
        match self.kind(name) {
            _ if self.is_empty() => Ok(()),
            Some(FieldKind::Additional) => Ok(()),
            Some(kind) => bail!("field '{}' is declared as {:?}", name, kind),
            None => bail!("field '{}' is not declared", name),
        }
    }
}
