#[path = "../support/mod.rs"]
mod support;

use support::fixtures::{metadata_config_map, reference_metadata, test_config};
use wellknown_ready::readiness::{CheckFailure, FailureClass, ReferenceSource};
use wellknown_ready::resources::InMemoryResources;

fn source() -> ReferenceSource {
    ReferenceSource::new(&test_config().metadata)
}

#[test]
fn reference_document_is_parsed_from_the_config_map() {
    let resources = InMemoryResources::new();
    resources.upsert_config_map(metadata_config_map(Some(&reference_metadata().to_string())));

    let document = source().fetch(&resources).expect("reference document");
    assert_eq!(document.into_value(), reference_metadata());
}

#[test]
fn missing_config_map_names_the_resource() {
    let failure = source().fetch(&InMemoryResources::new()).expect_err("missing");
    assert_eq!(
        failure,
        CheckFailure::MissingResource {
            namespace: "openshift-config-managed".to_string(),
            name: "oauth-openshift".to_string(),
        }
    );
    assert_eq!(failure.class(), FailureClass::PrerequisiteMissing);
    assert!(failure.to_string().contains("openshift-config-managed/oauth-openshift"));
}

#[test]
fn absent_or_empty_key_is_missing_data() {
    for data in [None, Some("")] {
        let resources = InMemoryResources::new();
        resources.upsert_config_map(metadata_config_map(data));

        let failure = source().fetch(&resources).expect_err("missing key");
        assert!(matches!(failure, CheckFailure::MissingKey { ref key, .. } if key == "oauthMetadata"));
        assert!(failure.to_string().contains("'oauthMetadata'"));
    }
}

#[test]
fn non_object_values_are_malformed() {
    for raw in ["[]", "\"issuer\"", "{broken"] {
        let resources = InMemoryResources::new();
        resources.upsert_config_map(metadata_config_map(Some(raw)));

        assert!(matches!(
            source().fetch(&resources),
            Err(CheckFailure::MalformedDocument { .. })
        ));
    }
}
