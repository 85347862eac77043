/// FHIR type code tables consulted by the element model.
pub struct FhirTypeDefinitions;

impl FhirTypeDefinitions {
    /// Type codes whose instances carry a `value` rather than child content.
    pub fn primitive_types() -> &'static [&'static str] {
        &[
            "boolean",
            "integer",
            "integer64",
            "string",
            "decimal",
            "uri",
            "base64Binary",
            "instant",
            "date",
            "dateTime",
            "time",
            "code",
            "oid",
            "id",
            "markdown",
            "unsignedInt",
            "positiveInt",
            "xhtml",
            "url",
            "canonical",
        ]
    }

    /// Abstract resource types; a field typed with one of these is a containment boundary.
    pub fn resource_base_types() -> &'static [&'static str] {
        &["Resource", "DomainResource"]
    }

    pub fn is_primitive(type_name: &str) -> bool {
        Self::primitive_types().contains(&type_name)
    }

    pub fn is_resource_base(type_name: &str) -> bool {
        Self::resource_base_types().contains(&type_name)
    }

    /// Upper-cases the first character, as used when suffixing choice names.
    pub fn capitalize(type_name: &str) -> String {
        let mut chars = type_name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}
