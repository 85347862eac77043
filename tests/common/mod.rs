use octofhir_elementmodel::*;
use serde_json::{Value, json};
use std::sync::Arc;

pub const V3_TYPE_BASE: &str = "http://hl7.org/cda/stds/core/StructureDefinition/";
#[allow(dead_code)]
pub const SAMPLE_URL: &str = "http://hl7.org/cda/stds/core/StructureDefinition/Sample";

#[allow(dead_code)]
pub fn structure(type_name: &str, kind: &str, url: &str, elements: Vec<Value>) -> Value {
    json!({
        "resourceType": "StructureDefinition",
        "url": url,
        "name": type_name,
        "status": "active",
        "kind": kind,
        "abstract": false,
        "type": type_name,
        "derivation": "specialization",
        "snapshot": { "element": elements }
    })
}

#[allow(dead_code)]
pub fn element(path: &str, types: &[&str], min: u32, max: &str) -> Value {
    let types: Vec<Value> = types.iter().map(|code| json!({ "code": code })).collect();
    let mut element = json!({ "id": path, "path": path, "min": min, "max": max });
    if !types.is_empty() {
        element["type"] = Value::Array(types);
    }
    element
}

#[allow(dead_code)]
pub fn attribute(path: &str, code: &str) -> Value {
    let mut element = element(path, &[code], 0, "1");
    element["representation"] = json!(["xmlAttr"]);
    element
}

fn with_extension(mut value: Value, url: &str, string: &str) -> Value {
    value["extension"] = json!([{ "url": url, "valueString": string }]);
    value
}

fn fhir(type_name: &str, kind: &str, elements: Vec<Value>) -> Value {
    structure(
        type_name,
        kind,
        &format!("{STRUCTURE_DEFINITION_BASE}{type_name}"),
        elements,
    )
}

fn primitive(type_name: &str) -> Value {
    fhir(
        type_name,
        "primitive-type",
        vec![
            element(type_name, &[], 0, "*"),
            attribute(&format!("{type_name}.id"), "http://hl7.org/fhirpath/System.String"),
            attribute(&format!("{type_name}.value"), "http://hl7.org/fhirpath/System.String"),
        ],
    )
}

fn v3(type_name: &str, elements: Vec<Value>) -> Value {
    let sd = structure(
        type_name,
        "logical",
        &format!("{V3_TYPE_BASE}{type_name}"),
        elements,
    );
    with_extension(sd, EXT_NAMESPACE, V3_NS)
}

/// Core FHIR definitions used across the suite.
#[allow(dead_code)]
pub fn fhir_definitions() -> Vec<Value> {
    let mut definitions: Vec<Value> = [
        "boolean", "string", "code", "id", "uri", "dateTime", "decimal",
    ]
    .iter()
    .map(|t| primitive(t))
    .collect();

    definitions.push(fhir(
        "HumanName",
        "complex-type",
        vec![
            element("HumanName", &[], 0, "*"),
            attribute("HumanName.id", "http://hl7.org/fhirpath/System.String"),
            element("HumanName.family", &["string"], 0, "1"),
            element("HumanName.given", &["string"], 0, "*"),
        ],
    ));
    definitions.push(fhir(
        "Quantity",
        "complex-type",
        vec![
            element("Quantity", &[], 0, "*"),
            element("Quantity.value", &["decimal"], 0, "1"),
            element("Quantity.unit", &["string"], 0, "1"),
        ],
    ));
    definitions.push(fhir(
        "Narrative",
        "complex-type",
        vec![
            element("Narrative", &[], 0, "*"),
            element("Narrative.status", &["code"], 1, "1"),
            element("Narrative.div", &["xhtml"], 1, "1"),
        ],
    ));
    definitions.push(fhir(
        "Patient",
        "resource",
        vec![
            element("Patient", &[], 0, "*"),
            element("Patient.id", &["id"], 0, "1"),
            element("Patient.text", &["Narrative"], 0, "1"),
            element("Patient.contained", &["Resource"], 0, "*"),
            element("Patient.active", &["boolean"], 0, "1"),
            element("Patient.name", &["HumanName"], 0, "*"),
            element("Patient.deceased[x]", &["boolean", "dateTime"], 0, "1"),
            element("Patient.contact", &["BackboneElement"], 0, "*"),
            element("Patient.contact.name", &["HumanName"], 0, "1"),
            element("Patient.contact.relationship", &["code"], 0, "*"),
        ],
    ));
    definitions.push(fhir(
        "Observation",
        "resource",
        vec![
            element("Observation", &[], 0, "*"),
            element("Observation.id", &["id"], 0, "1"),
            element("Observation.status", &["code"], 1, "1"),
            element("Observation.value[x]", &["Quantity", "string", "boolean"], 0, "1"),
            element("Observation.note", &["string"], 0, "*"),
        ],
    ));
    definitions.push(fhir(
        "Bundle",
        "resource",
        vec![
            element("Bundle", &[], 0, "*"),
            element("Bundle.id", &["id"], 0, "1"),
            element("Bundle.type", &["code"], 1, "1"),
            element("Bundle.entry", &["BackboneElement"], 0, "*"),
            element("Bundle.entry.fullUrl", &["uri"], 0, "1"),
            element("Bundle.entry.resource", &["Resource"], 0, "1"),
        ],
    ));
    definitions.push(fhir(
        "Parameters",
        "resource",
        vec![
            element("Parameters", &[], 0, "*"),
            element("Parameters.parameter", &["BackboneElement"], 0, "*"),
            element("Parameters.parameter.name", &["string"], 1, "1"),
            element("Parameters.parameter.resource", &["Resource"], 0, "1"),
        ],
    ));
    definitions.push(fhir(
        "Group",
        "resource",
        vec![
            element("Group", &[], 0, "*"),
            element("Group.member", &["BackboneElement"], 0, "*"),
            element("Group.member.entity", &["string"], 1, "1"),
            with_content_reference(element("Group.member.member", &[], 0, "*"), "#Group.member"),
        ],
    ));
    definitions
}

fn with_content_reference(mut value: Value, reference: &str) -> Value {
    value["contentReference"] = json!(reference);
    value
}

/// A CDA-style logical model in the v3 namespace.
#[allow(dead_code)]
pub fn v3_definitions() -> Vec<Value> {
    let mut effective_time = attribute("Sample.effectiveTime", "dateTime");
    effective_time = with_extension(effective_time, EXT_DATE_FORMAT, "v3");

    let pq = format!("{V3_TYPE_BASE}PQ");
    let ed = format!("{V3_TYPE_BASE}ED");

    let mut value = element("Sample.value[x]", &[pq.as_str(), ed.as_str()], 0, "1");
    value["representation"] = json!(["typeAttr"]);

    let mut comment = element("Sample.comment[x]", &[ed.as_str(), pq.as_str()], 0, "1");
    comment["representation"] = json!(["typeAttr"]);
    comment = with_extension(comment, EXT_DEFAULT_TYPE, "ED");

    let mut text = element("Sample.text", &["xhtml"], 0, "1");
    text["representation"] = json!(["cdaText"]);

    let mut data = element("ED.data[x]", &["string", "base64Binary"], 0, "1");
    data["representation"] = json!(["xmlText"]);

    vec![
        v3(
            "Sample",
            vec![
                element("Sample", &[], 0, "*"),
                attribute("Sample.classCode", "code"),
                effective_time,
                value,
                comment,
                text,
            ],
        ),
        v3(
            "PQ",
            vec![
                element("PQ", &[], 0, "*"),
                attribute("PQ.value", "decimal"),
                attribute("PQ.unit", "code"),
            ],
        ),
        v3(
            "ED",
            vec![
                element("ED", &[], 0, "*"),
                attribute("ED.representation", "code"),
                data,
            ],
        ),
    ]
}

#[allow(dead_code)]
pub fn repository() -> MemoryRepository {
    let mut repository = MemoryRepository::new();
    for definition in fhir_definitions().into_iter().chain(v3_definitions()) {
        repository.load_json(definition).unwrap();
    }
    repository
}

#[allow(dead_code)]
pub fn parser() -> XmlParser {
    XmlParser::new(Arc::new(repository()))
}

#[allow(dead_code)]
pub fn config(policy: ValidationPolicy) -> ParserConfig {
    ParserConfig::with_policy(policy)
}

#[allow(dead_code)]
pub fn parse_ok(xml: &str, policy: ValidationPolicy) -> (Element, Vec<Diagnostic>) {
    let outcome = parser().parse(xml.as_bytes(), &config(policy)).unwrap();
    (outcome.element.unwrap(), outcome.diagnostics)
}

#[allow(dead_code)]
pub fn compose(element: &Element) -> String {
    parser()
        .compose_to_string(element, OutputStyle::Normal, &ParserConfig::default())
        .unwrap()
}

#[allow(dead_code)]
pub fn messages(diagnostics: &[Diagnostic]) -> Vec<&str> {
    diagnostics.iter().map(|d| d.message.as_str()).collect()
}

#[allow(dead_code)]
pub const PATIENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Patient xmlns="http://hl7.org/fhir">
  <!-- the subject -->
  <id value="example"/>
  <active value="true"/>
  <name id="n1">
    <family value="Chalmers"/>
    <given value="Peter"/>
    <given value="James"/>
  </name>
  <deceasedBoolean value="false"/>
  <!-- trailing -->
</Patient>"#;

#[allow(dead_code)]
pub const SAMPLE: &str = r#"<Sample xmlns="urn:hl7-org:v3" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" classCode="OBS" effectiveTime="20200115103045+1000">
  <value xsi:type="PQ" value="5" unit="mg"/>
  <comment representation="B64">aGVsbG8=</comment>
  <text><paragraph>Hello <content styleCode="Bold">world</content></paragraph></text>
</Sample>"#;
