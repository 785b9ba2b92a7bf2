use crate::codecs::CodecRegistry;
use crate::model::{EditableNode, GenericNode};
use crate::processing::{ProcessingConfig, ProcessingMode, generate};
use crate::serializing;

/// Work out which mode produced `existing`.
///
/// Markup identical to what a managed mode would generate for this content
/// is that mode. Anything else, including template references, is custom
/// with the markup kept as its payload. No markup at all is the default
/// mode.
pub(super) fn classify(
    existing: Option<GenericNode>,
    content: &[EditableNode],
    registry: &CodecRegistry,
) -> ProcessingConfig {
    let Some(existing) = existing else {
        log::debug!("no response processing; using {}", ProcessingMode::default());
        return ProcessingConfig::default();
    };

    if existing.attribute("template").is_none() {
        let input = serializing::generator_input(content, registry);
        for mode in [ProcessingMode::AllCorrect, ProcessingMode::SumScores] {
            let generated = generate(mode, &input, registry).response_processing();
            if generated.as_ref() == Some(&existing) {
                log::debug!("response processing matches {mode}");
                return ProcessingConfig {
                    mode,
                    custom_payload: None,
                };
            }
        }
    }

    log::debug!("response processing kept as custom");
    ProcessingConfig::custom(existing)
}

#[cfg(test)]
mod tests {
    use crate::parsing::parse;
    use crate::processing::ProcessingMode;
    use crate::serializing::serialize;
    use pretty_assertions::assert_eq;

    const ITEM: &str = r#"<assessmentItem identifier="q1">
  <responseDeclaration identifier="R1" cardinality="single" baseType="string">
    <correctResponse><value>paris</value></correctResponse>
  </responseDeclaration>
  <outcomeDeclaration identifier="SCORE" cardinality="single" baseType="float"/>
  <itemBody><p>Capital: <textEntryInteraction responseIdentifier="R1"/></p></itemBody>
  RP
</assessmentItem>"#;

    fn with_processing(processing: &str) -> String {
        ITEM.replace("RP", processing)
    }

    #[test]
    fn absent_processing_is_all_correct() {
        let doc = parse(&with_processing("")).document;
        let config = doc.processing();
        assert_eq!(config.mode, ProcessingMode::AllCorrect);
        assert_eq!(config.custom_payload, None);
    }

    #[test]
    fn template_processing_is_custom() {
        let doc = parse(&with_processing(
            r#"<responseProcessing template="http://www.imsglobal.org/question/qti_v2p2/rptemplates/match_correct"/>"#,
        ))
        .document;
        let config = doc.processing();
        assert_eq!(config.mode, ProcessingMode::Custom);
        assert_eq!(
            config.custom_payload.unwrap().attribute("template"),
            Some("http://www.imsglobal.org/question/qti_v2p2/rptemplates/match_correct")
        );
    }

    #[test]
    fn generated_processing_is_recognised() {
        for mode in [ProcessingMode::AllCorrect, ProcessingMode::SumScores] {
            let first = parse(&with_processing("")).document.with_processing_mode(mode);
            let markup = serialize(&first, Some(&with_processing(""))).markup;

            assert_eq!(parse(&markup).document.processing().mode, mode, "{markup}");
        }
    }

    #[test]
    fn hand_written_processing_is_custom() {
        let doc = parse(&with_processing(
            r#"<responseProcessing><setOutcomeValue identifier="SCORE"><baseValue baseType="float">7</baseValue></setOutcomeValue></responseProcessing>"#,
        ))
        .document;
        assert_eq!(doc.processing().mode, ProcessingMode::Custom);
    }
}
