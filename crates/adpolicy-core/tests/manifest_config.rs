//! App manifest config parsing tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use adpolicy_core::manifest::{parse_config, AccessResult, ApiSurface, AppManifestConfig};

const FULL_CONFIG: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ad-services-config>
    <includes-sdk-library name="1234" />
    <includes-sdk-library name="4567" />
    <includes-sdk-library name="89" />
    <includes-sdk-library name="1234567" />
    <attribution allowAll="false" allowAdPartnersToAccess="1234" />
    <custom-audiences allowAll="false" allowAdPartnersToAccess="1234,4567" />
    <protected-signals allowAll="false" allowAdPartnersToAccess="42, 43" />
    <ad-selection allowAll="false" allowAdPartnersToAccess="44 45" />
    <topics allowAll="false" allowAdPartnersToAccess="1234567" />
    <adid allowAll="false" allowAdPartnersToAccess="4,8,15,16,23,42" />
    <appsetid allowAll="false" allowAdPartnersToAccess="4,8,15,16,23,42" />
</ad-services-config>
"#;

const MISSING_TAGS: &str = "<ad-services-config></ad-services-config>";

const ALL_FALSE_MISSING_TOPICS: &str = r#"
<ad-services-config>
    <attribution allowAll="false" />
    <custom-audiences allowAll="false" />
    <protected-signals allowAll="false" />
    <ad-selection allowAll="false" />
    <ad-id allowAll="false" />
    <app-set-id allowAll="false" />
</ad-services-config>
"#;

fn parse_err(xml: &str) -> String {
    parse_config(xml, false).expect_err("must fail").to_string()
}

fn assert_all(
    cfg: &AppManifestConfig,
    id: &str,
    expected: AccessResult,
    except: Option<(ApiSurface, AccessResult)>,
) {
    for surface in ApiSurface::ALL {
        let want = match except {
            Some((s, r)) if s == surface => r,
            _ => expected,
        };
        assert_eq!(cfg.is_allowed_access(surface, id), want, "surface={surface:?}");
    }
}

#[test]
fn valid_config_answers_per_surface() {
    let cfg = parse_config(FULL_CONFIG, false).unwrap();

    for sdk in ["1234", "4567", "89", "1234567"] {
        assert!(cfg.includes_sdk_library.contains(sdk), "sdk={sdk}");
    }
    assert!(!cfg.includes_sdk_library.contains("42"));

    assert_eq!(cfg.is_allowed_attribution_access("1234"), AccessResult::AllowedAppAllowsSpecificId);
    assert_eq!(cfg.is_allowed_attribution_access("108"), AccessResult::DisallowedByApp);
    assert!(!cfg.attribution.as_ref().unwrap().allow_all);

    let ca = cfg.custom_audiences.as_ref().unwrap();
    assert_eq!(ca.allow_ad_partners.len(), 2);
    assert!(ca.allow_ad_partners.contains("4567"));
    assert_eq!(cfg.is_allowed_custom_audiences_access("108"), AccessResult::DisallowedByApp);

    assert_eq!(
        cfg.is_allowed_protected_signals_access("43"),
        AccessResult::AllowedAppAllowsSpecificId
    );
    assert_eq!(cfg.is_allowed_ad_selection_access("45"), AccessResult::AllowedAppAllowsSpecificId);
    assert_eq!(cfg.is_allowed_topics_access("1234567"), AccessResult::AllowedAppAllowsSpecificId);
    assert_eq!(cfg.is_allowed_ad_id_access("42"), AccessResult::AllowedAppAllowsSpecificId);
    assert_eq!(cfg.is_allowed_app_set_id_access("42"), AccessResult::AllowedAppAllowsSpecificId);
    assert_eq!(cfg.is_allowed_app_set_id_access("108"), AccessResult::DisallowedByApp);
}

#[test]
fn allow_all_grants_everyone() {
    let cfg = parse_config(
        r#"<ad-services-config>
            <topics allowAll="true" allowAdPartnersToAccess="" />
        </ad-services-config>"#,
        false,
    )
    .unwrap();
    assert_eq!(cfg.is_allowed_topics_access("anything"), AccessResult::AllowedAppAllowsAll);
}

#[test]
fn missing_tags_disabled_by_default() {
    let cfg = parse_config(MISSING_TAGS, false).unwrap();
    assert!(cfg.includes_sdk_library.is_empty());
    assert!(!cfg.includes_sdk_library.contains("42"));
    assert_all(
        &cfg,
        "not actually there",
        AccessResult::DisallowedAppHasConfigWithoutApiSection,
        None,
    );
}

#[test]
fn missing_tags_enabled_by_default() {
    let cfg = parse_config(MISSING_TAGS, true).unwrap();
    assert!(cfg.includes_sdk_library.contains("42"));
    assert_all(&cfg, "42", AccessResult::AllowedByDefaultAppHasConfigWithoutApiSection, None);
}

#[test]
fn enabled_by_default_only_fills_the_missing_section() {
    let cfg = parse_config(ALL_FALSE_MISSING_TOPICS, true).unwrap();
    assert_all(
        &cfg,
        "42",
        AccessResult::DisallowedByApp,
        Some((ApiSurface::Topics, AccessResult::AllowedByDefaultAppHasConfigWithoutApiSection)),
    );
}

#[test]
fn listed_sdk_libraries_override_the_default() {
    let cfg = parse_config(
        r#"<ad-services-config>
            <includes-sdk-library name="42" />
            <includes-sdk-library name="108" />
        </ad-services-config>"#,
        true,
    )
    .unwrap();
    assert!(cfg.includes_sdk_library.contains("42"));
    assert!(cfg.includes_sdk_library.contains("108"));
    assert!(!cfg.includes_sdk_library.contains("4815162342"));
}

#[test]
fn tags_without_values_deny_access() {
    let cfg = parse_config(
        r#"<ad-services-config>
            <attribution /><custom-audiences /><protected-signals /><ad-selection />
            <topics /><adid /><appsetid />
        </ad-services-config>"#,
        false,
    )
    .unwrap();
    assert_all(&cfg, "42", AccessResult::DisallowedByApp, None);
}

#[test]
fn rejects_missing_sdk_name() {
    assert_eq!(
        parse_err("<ad-services-config><includes-sdk-library /></ad-services-config>"),
        "Sdk name not mentioned in <includes-sdk-library>"
    );
}

#[test]
fn rejects_allow_all_with_partners() {
    assert_eq!(
        parse_err(
            r#"<ad-services-config>
                <attribution allowAll="true" allowAdPartnersToAccess="1234" />
            </ad-services-config>"#
        ),
        "allowAll cannot be set to true when allowAdPartners is also set"
    );
}

#[test]
fn rejects_repeated_tags() {
    assert_eq!(
        parse_err(
            r#"<ad-services-config>
                <custom-audiences allowAll="true" />
                <custom-audiences allowAll="false" />
            </ad-services-config>"#
        ),
        "Tag custom-audiences appears more than once"
    );
}

#[test]
fn rejects_wrong_root() {
    assert_eq!(parse_err("<ad-services>"), "expected START_TAG ad-services-config");
    assert_eq!(parse_err(""), "expected START_TAG ad-services-config");
}

#[test]
fn rejects_unknown_tag_case_sensitive() {
    assert_eq!(
        parse_err("<ad-services-config><foobar /></ad-services-config>"),
        "Unknown tag: foobar [Tags and attributes are case sensitive]"
    );
    assert_eq!(
        parse_err("<ad-services-config><Topics /></ad-services-config>"),
        "Unknown tag: Topics [Tags and attributes are case sensitive]"
    );
}

#[test]
fn rejects_unknown_attribute_case_sensitive() {
    assert_eq!(
        parse_err(r#"<ad-services-config><topics foobar="1" /></ad-services-config>"#),
        "Unknown attribute: foobar [Tags and attributes are case sensitive]"
    );
    assert_eq!(
        parse_err(r#"<ad-services-config><topics allowall="true" /></ad-services-config>"#),
        "Unknown attribute: allowall [Tags and attributes are case sensitive]"
    );
}

#[test]
fn parse_errors_map_to_invalid_argument() {
    let err = parse_config("<nope/>", false).unwrap_err();
    assert_eq!(err.status_code().as_str(), "INVALID_ARGUMENT");
}
