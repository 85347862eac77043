mod common;

use common::*;
use octofhir_elementmodel::*;
use std::sync::Arc;

#[test]
fn test_compose_patient() {
    let (patient, _) = parse_ok(PATIENT, ValidationPolicy::Everything);
    assert_eq!(
        compose(&patient),
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?><!-- trailing --><Patient xmlns="http://hl7.org/fhir">"#,
            r#"<!-- the subject --><id value="example"/><active value="true"/>"#,
            r#"<name id="n1"><family value="Chalmers"/><given value="Peter"/><given value="James"/></name>"#,
            r#"<deceasedBoolean value="false"/></Patient>"#
        )
    );
}

#[test]
fn test_compose_logical_model() {
    let (sample, _) = parse_ok(SAMPLE, ValidationPolicy::Everything);
    assert_eq!(
        compose(&sample),
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<Sample xmlns="urn:hl7-org:v3" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" classCode="OBS" effectiveTime="20200115103045+1000">"#,
            r#"<value xsi:type="PQ" value="5" unit="mg"/>"#,
            r#"<comment xsi:type="ED" representation="B64">aGVsbG8=</comment>"#,
            r#"<text><paragraph>Hello <content styleCode="Bold">world</content></paragraph></text>"#,
            r#"</Sample>"#
        )
    );
}

#[test]
fn test_compose_narrative() {
    let xml = r#"<Patient xmlns="http://hl7.org/fhir"><text><status value="generated"/><div xmlns="http://www.w3.org/1999/xhtml"><p>a &lt; b</p></div></text></Patient>"#;
    let (patient, _) = parse_ok(xml, ValidationPolicy::Quick);
    assert_eq!(
        compose(&patient),
        format!(r#"<?xml version="1.0" encoding="UTF-8"?>{xml}"#)
    );
}

#[test]
fn test_compose_pretty() {
    let (patient, _) = parse_ok(PATIENT, ValidationPolicy::None);
    let xml = parser()
        .compose_to_string(&patient, OutputStyle::Pretty, &ParserConfig::default())
        .unwrap();
    assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
    assert!(xml.contains("\n  <id value=\"example\"/>"), "{xml}");
    assert!(xml.contains("\n    <given value=\"Peter\"/>"), "{xml}");
    assert!(!xml.contains("xmlns:xsi"));
}

#[test]
fn test_compose_to_writer() {
    let (patient, _) = parse_ok(PATIENT, ValidationPolicy::None);
    let mut output = Vec::new();
    ElementModelParser::compose(
        &parser(),
        &patient,
        &mut output,
        OutputStyle::Normal,
        &ParserConfig::default(),
    )
    .unwrap();
    assert_eq!(String::from_utf8(output).unwrap(), compose(&patient));
}

#[test]
fn test_empty_type_attribute_field() {
    let xml = r#"<Sample xmlns="urn:hl7-org:v3" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><value xsi:type="PQ"/></Sample>"#;
    let (sample, _) = parse_ok(xml, ValidationPolicy::None);
    assert_eq!(
        compose(&sample),
        format!(r#"<?xml version="1.0" encoding="UTF-8"?>{xml}"#)
    );
}

/// Records everything a composer sends, one line per call.
#[derive(Default)]
struct RecordingSink {
    events: Vec<String>,
}

impl XmlSink for RecordingSink {
    fn start(&mut self) -> Result<()> {
        self.events.push("start".to_string());
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.events.push("end".to_string());
        Ok(())
    }

    fn set_default_namespace(&mut self, namespace: &str) -> Result<()> {
        self.events.push(format!("xmlns={namespace}"));
        Ok(())
    }

    fn namespace(&mut self, namespace: &str, prefix: &str) -> Result<()> {
        self.events.push(format!("xmlns:{prefix}={namespace}"));
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.events.push(format!("@{name}={value}"));
        Ok(())
    }

    fn enter(&mut self, name: &str) -> Result<()> {
        self.events.push(format!("<{name}>"));
        Ok(())
    }

    fn exit(&mut self, name: &str) -> Result<()> {
        self.events.push(format!("</{name}>"));
        Ok(())
    }

    fn element(&mut self, name: &str) -> Result<()> {
        self.events.push(format!("<{name}/>"));
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.events.push(format!("text:{text}"));
        Ok(())
    }

    fn escaped_text(&mut self, markup: &str) -> Result<()> {
        self.events.push(format!("markup:{markup}"));
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<()> {
        self.events.push(format!("comment:{text}"));
        Ok(())
    }

    fn link(&mut self, href: Option<&str>) -> Result<()> {
        self.events.push(format!("link:{}", href.unwrap_or("-")));
        Ok(())
    }

    fn anchor(&mut self, name: &str) -> Result<()> {
        self.events.push(format!("anchor:{name}"));
        Ok(())
    }

    fn decorate(&mut self, decoration: &ElementDecoration) -> Result<()> {
        self.events.push(format!("decorate:{}", decoration.text));
        Ok(())
    }
}

struct DocsResolver;

impl LinkResolver for DocsResolver {
    fn resolve_type(&self, type_name: &str) -> Option<String> {
        Some(format!("types#{type_name}"))
    }

    fn resolve_property(&self, property: &Property) -> Option<String> {
        Some(format!("props#{}", property.definition().path))
    }

    fn resolve_page(&self, name: &str) -> Option<String> {
        Some(format!("{name}.html"))
    }
}

fn record(element: &Element, config: &ParserConfig) -> Vec<String> {
    let mut sink = RecordingSink::default();
    parser().compose_to_sink(element, &mut sink, config).unwrap();
    sink.events
}

#[test]
fn test_sink_receives_links() {
    let (patient, _) = parse_ok(
        r#"<Patient xmlns="http://hl7.org/fhir"><active value="true"/></Patient>"#,
        ValidationPolicy::None,
    );
    let config = ParserConfig::builder()
        .link_resolver(Arc::new(DocsResolver))
        .build();
    assert_eq!(
        record(&patient, &config),
        vec![
            "start",
            "xmlns=http://hl7.org/fhir",
            "link:props#Patient",
            "<Patient>",
            "link:types#boolean",
            "@value=true",
            "link:props#Patient.active",
            "<active/>",
            "</Patient>",
            "end",
        ]
    );

    let plain = record(&patient, &ParserConfig::default());
    assert!(plain.iter().all(|e| !e.starts_with("link:")));
}

#[test]
fn test_sink_receives_decorations_when_enabled() {
    let (mut patient, _) = parse_ok(
        r#"<Patient xmlns="http://hl7.org/fhir"><active value="true"/></Patient>"#,
        ValidationPolicy::None,
    );
    patient.children[0]
        .decorations
        .push(ElementDecoration::new(DecorationType::Hint, None, "checked"));

    let shown = record(
        &patient,
        &ParserConfig::builder().show_decorations(true).build(),
    );
    assert!(shown.contains(&"decorate:checked".to_string()));

    let hidden = record(&patient, &ParserConfig::default());
    assert!(!hidden.contains(&"decorate:checked".to_string()));
}

#[test]
fn test_sink_marks_end_of_narrative() {
    let (patient, _) = parse_ok(
        r#"<Patient xmlns="http://hl7.org/fhir"><text><status value="generated"/><div xmlns="http://www.w3.org/1999/xhtml">hi</div></text></Patient>"#,
        ValidationPolicy::None,
    );
    let events = record(&patient, &ParserConfig::default());
    let markup = events.iter().position(|e| e.starts_with("markup:")).unwrap();
    assert_eq!(events[markup + 1], "anchor:end-xhtml");
}
