use std::io::Write;
use std::sync::Arc;

use crate::core::{Diagnostic, IssueSeverity, IssueType, OutputStyle, ParserConfig, ValidationPolicy};
use crate::elementmodel::Element;
use crate::error::{ElementModelError, Result};
use crate::storage::SchemaRepository;
use crate::types::{
    EXT_NAMESPACE, FHIR_NS, HasExtensions, STRUCTURE_DEFINITION_BASE, StructureDefinition,
};

/// Result of a parse: the tree when one could be built, and whatever the
/// policy chose to collect.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub element: Option<Element>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutcome {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error_or_worse)
    }
}

/// A wire format for the element model.
pub trait ElementModelParser {
    fn parse(&self, input: &[u8], config: &ParserConfig) -> Result<ParseOutcome>;

    fn compose(
        &self,
        element: &Element,
        output: &mut dyn Write,
        style: OutputStyle,
        config: &ParserConfig,
    ) -> Result<()>;
}

/// Per-call state shared by the format parsers: the diagnostic gate and
/// definition lookup against the repository.
pub struct ParseSession<'a> {
    config: &'a ParserConfig,
    repository: &'a dyn SchemaRepository,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ParseSession<'a> {
    pub fn new(config: &'a ParserConfig, repository: &'a dyn SchemaRepository) -> Self {
        Self {
            config,
            repository,
            diagnostics: Vec::new(),
        }
    }

    pub fn config(&self) -> &ParserConfig {
        self.config
    }

    pub fn repository(&self) -> &'a dyn SchemaRepository {
        self.repository
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.config.policy
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Records, aborts on, or discards a problem according to the policy.
    ///
    /// Returns `Err` only when the problem aborts the parse.
    pub fn report(
        &mut self,
        line: usize,
        column: usize,
        path: &str,
        kind: IssueType,
        message: impl Into<String>,
        severity: IssueSeverity,
    ) -> Result<()> {
        let message = message.into();
        match self.config.policy {
            ValidationPolicy::Everything => {
                self.diagnostics
                    .push(Diagnostic::new(severity, kind, line, column, path, message));
                Ok(())
            }
            policy => {
                let aborts = severity == IssueSeverity::Fatal
                    || (severity == IssueSeverity::Error && policy == ValidationPolicy::Quick);
                if aborts {
                    Err(ElementModelError::format(format!(
                        "{message} at line {line} col {column}"
                    )))
                } else {
                    tracing::trace!("Discarding {:?} at {}: {}", severity, path, message);
                    Ok(())
                }
            }
        }
    }

    /// Finds the definition for a document element from its namespace and name.
    ///
    /// Only specialisations are candidates, data element definitions are
    /// skipped, and the first match in repository order wins.
    pub fn resolve_root_definition(
        &mut self,
        line: usize,
        column: usize,
        namespace: Option<&str>,
        name: Option<&str>,
    ) -> Result<Option<Arc<StructureDefinition>>> {
        let Some(namespace) = namespace.filter(|ns| !ns.is_empty()) else {
            let shown = name.unwrap_or("");
            self.report(
                line,
                column,
                shown,
                IssueType::Structure,
                format!("This '{shown}' cannot be parsed as a FHIR object (no namespace)"),
                IssueSeverity::Fatal,
            )?;
            return Ok(None);
        };
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            self.report(
                line,
                column,
                "",
                IssueType::Structure,
                "This cannot be parsed as a FHIR object (no name)",
                IssueSeverity::Fatal,
            )?;
            return Ok(None);
        };

        let found = self.repository.all_structures().into_iter().find(|sd| {
            if !sd.is_specialization() || sd.is_data_element() || sd.type_name != name {
                return false;
            }
            match sd.read_string_extension(EXT_NAMESPACE) {
                Some(declared) => declared == namespace,
                None => !sd.has_extension(EXT_NAMESPACE) && namespace == FHIR_NS,
            }
        });

        match found {
            Some(sd) => {
                tracing::debug!("Resolved root {}#{} to {:?}", namespace, name, sd.url_str());
                Ok(Some(self.repository.generate_snapshot(&sd)?))
            }
            None => {
                self.report(
                    line,
                    column,
                    name,
                    IssueType::Structure,
                    format!(
                        "This does not appear to be a FHIR resource (unknown namespace/name '{namespace}::{name}')"
                    ),
                    IssueSeverity::Fatal,
                )?;
                Ok(None)
            }
        }
    }

    /// Finds a definition by bare type name: the core canonical URL first,
    /// then any specialisation of that type.
    pub fn resolve_definition_by_name(
        &mut self,
        line: usize,
        column: usize,
        name: Option<&str>,
    ) -> Result<Option<Arc<StructureDefinition>>> {
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            self.report(
                line,
                column,
                "",
                IssueType::Structure,
                "This cannot be parsed as a FHIR object (no name)",
                IssueSeverity::Fatal,
            )?;
            return Ok(None);
        };

        let canonical = format!("{STRUCTURE_DEFINITION_BASE}{name}");
        let structures = self.repository.structures();
        let found = structures
            .iter()
            .find(|sd| sd.url_str() == Some(canonical.as_str()))
            .or_else(|| {
                structures
                    .iter()
                    .find(|sd| sd.type_name == name && sd.is_specialization())
            });

        match found {
            Some(sd) => {
                tracing::debug!("Resolved type {} to {:?}", name, sd.url_str());
                Ok(Some(self.repository.generate_snapshot(sd)?))
            }
            None => {
                self.report(
                    line,
                    column,
                    name,
                    IssueType::Structure,
                    format!(
                        "This does not appear to be a FHIR resource (unknown name '{name}')"
                    ),
                    IssueSeverity::Fatal,
                )?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryRepository;
    use crate::types::{ElementDefinition, Extension, TypeDerivationRule};
    use url::Url;

    fn repository() -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        repo.add(
            StructureDefinition::new("Patient", "resource")
                .with_url(Url::parse("http://hl7.org/fhir/StructureDefinition/Patient").unwrap())
                .with_derivation(TypeDerivationRule::Specialization)
                .with_differential(vec![ElementDefinition::new("Patient")]),
        );
        repo.add(
            StructureDefinition::new("Patient", "logical")
                .with_url(Url::parse("http://example.org/StructureDefinition/v3-Patient").unwrap())
                .with_derivation(TypeDerivationRule::Specialization)
                .with_extension(Extension::string(EXT_NAMESPACE, "urn:hl7-org:v3"))
                .with_snapshot(vec![ElementDefinition::new("Patient")]),
        );
        repo
    }

    #[test]
    fn test_gate_everything_collects() {
        let repo = repository();
        let config = ParserConfig::with_policy(ValidationPolicy::Everything);
        let mut session = ParseSession::new(&config, &repo);
        session
            .report(1, 2, "/f:Patient", IssueType::Structure, "bad", IssueSeverity::Fatal)
            .unwrap();
        session
            .report(1, 2, "/f:Patient", IssueType::Invalid, "warn", IssueSeverity::Warning)
            .unwrap();
        assert_eq!(session.diagnostics().len(), 2);
    }

    #[test]
    fn test_gate_quick_aborts_on_error() {
        let repo = repository();
        let config = ParserConfig::with_policy(ValidationPolicy::Quick);
        let mut session = ParseSession::new(&config, &repo);
        assert!(
            session
                .report(0, 0, "", IssueType::Invalid, "w", IssueSeverity::Warning)
                .is_ok()
        );
        let err = session
            .report(3, 7, "", IssueType::Structure, "Undefined element 'x'", IssueSeverity::Error)
            .unwrap_err();
        assert_eq!(err.to_string(), "Format error: Undefined element 'x' at line 3 col 7");
        assert!(session.diagnostics().is_empty());
    }

    #[test]
    fn test_gate_none_only_fatal_aborts() {
        let repo = repository();
        let config = ParserConfig::default();
        let mut session = ParseSession::new(&config, &repo);
        assert!(
            session
                .report(0, 0, "", IssueType::Structure, "e", IssueSeverity::Error)
                .is_ok()
        );
        assert!(
            session
                .report(0, 0, "", IssueType::Structure, "f", IssueSeverity::Fatal)
                .is_err()
        );
    }

    #[test]
    fn test_resolve_root_by_namespace() {
        let repo = repository();
        let config = ParserConfig::with_policy(ValidationPolicy::Everything);
        let mut session = ParseSession::new(&config, &repo);

        let fhir = session
            .resolve_root_definition(1, 1, Some(FHIR_NS), Some("Patient"))
            .unwrap()
            .unwrap();
        assert_eq!(fhir.kind, "resource");
        assert!(fhir.has_snapshot());

        let v3 = session
            .resolve_root_definition(1, 1, Some("urn:hl7-org:v3"), Some("Patient"))
            .unwrap()
            .unwrap();
        assert_eq!(v3.kind, "logical");

        assert!(
            session
                .resolve_root_definition(1, 1, Some("urn:other"), Some("Patient"))
                .unwrap()
                .is_none()
        );
        assert!(
            session
                .resolve_root_definition(1, 1, None, Some("Patient"))
                .unwrap()
                .is_none()
        );
        assert_eq!(session.diagnostics().len(), 2);
        assert!(
            session
                .diagnostics()
                .iter()
                .all(|d| d.severity == IssueSeverity::Fatal)
        );
    }

    #[test]
    fn test_resolve_by_name_prefers_canonical_url() {
        let repo = repository();
        let config = ParserConfig::default();
        let mut session = ParseSession::new(&config, &repo);
        let sd = session
            .resolve_definition_by_name(0, 0, Some("Patient"))
            .unwrap()
            .unwrap();
        assert_eq!(
            sd.url_str(),
            Some("http://hl7.org/fhir/StructureDefinition/Patient")
        );
        assert!(session.resolve_definition_by_name(0, 0, Some("Nope")).is_err());
    }
}
