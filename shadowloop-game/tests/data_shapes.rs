use std::collections::BTreeSet;

use shadowloop_game::{
    CastPool, DataLoader, Event, GameEngine, Phase, RuleTag, ScriptCatalog, ScriptCategory,
    SessionConfig, StaticLoader,
};

fn catalog() -> ScriptCatalog {
    StaticLoader.load_catalog().unwrap()
}

#[test]
fn every_shipped_rule_tag_is_registered() {
    let catalog = catalog();
    for category in [ScriptCategory::Main, ScriptCategory::Sub] {
        for part in catalog.parts(category) {
            let tag = RuleTag::parse(part.rule_tag());
            assert!(
                !matches!(tag, RuleTag::Unregistered(_) | RuleTag::Untagged),
                "part '{}' has tag '{}'",
                part.id,
                part.rule_tag()
            );
            assert_eq!(tag.as_str(), part.rule_tag());
        }
    }
    for part in catalog.parts(ScriptCategory::Main) {
        assert!(
            RuleTag::parse(part.rule_tag()).loss_predicate().is_some(),
            "main part '{}' has no loss predicate",
            part.id
        );
    }
}

#[test]
fn every_ability_role_can_be_dealt() {
    let catalog = catalog();
    let dealt: BTreeSet<&str> = ScriptCategory::ALL
        .iter()
        .flat_map(|category| catalog.parts(*category))
        .flat_map(|part| part.roles.iter().map(|req| req.name.as_str()))
        .collect();
    for directive in &catalog.role_data {
        assert!(
            dealt.contains(directive.role.as_str()),
            "ability for '{}' can never fire",
            directive.role
        );
    }
}

#[test]
fn foreshadow_parts_define_events() {
    for part in catalog().parts(ScriptCategory::Foreshadow) {
        assert!(part.panic_event.is_some() || part.intrigue_event.is_some());
    }
}

#[test]
fn cast_ids_are_unique() {
    let pool = CastPool::default_pool().unwrap();
    let ids: BTreeSet<u32> = pool.entries.iter().map(|entry| entry.id.0).collect();
    assert_eq!(ids.len(), pool.len());
    assert_eq!(pool.len(), 15);
}

#[test]
fn malformed_catalogs_are_rejected() {
    let zero = r#"{ "main": [ { "id": "a", "name": "A", "roles": [ { "name": "killer", "count": 0 } ] } ] }"#;
    assert!(ScriptCatalog::from_json(zero).is_err());
    let civilian = r#"{ "main": [ { "id": "a", "name": "A", "roles": [ { "name": "civilian" } ] } ] }"#;
    assert!(ScriptCatalog::from_json(civilian).is_err());
    assert!(ScriptCatalog::from_json("not json").is_err());
}

#[test]
fn partial_config_takes_defaults() {
    let config = SessionConfig::from_json(r#"{ "max_days": 6 }"#).unwrap();
    assert_eq!(config.max_days, 6);
    assert_eq!(config.base_action_points, SessionConfig::default().base_action_points);
    assert!(SessionConfig::from_json(r#"{ "stay_chance": 1.5 }"#).is_err());
}

#[test]
fn journal_serializes_with_snake_case_kinds() {
    let mut session = GameEngine::new(StaticLoader)
        .create_session(3, SessionConfig::default(), ())
        .unwrap();
    session.advance_to_noon();
    let json = serde_json::to_string(&session.state().events).unwrap();
    assert!(json.contains("\"scenario_built\""));
    assert!(json.contains("\"phase_started\""));
    let parsed: Vec<Event> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, session.state().events);
    assert_eq!(parsed.last().and_then(|e| e.phase), Some(Phase::Noon));
}
