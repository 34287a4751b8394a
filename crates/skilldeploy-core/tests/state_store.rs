use serde_json::json;
use tempfile::TempDir;

use skilldeploy_core::state::{DeployStateStore, InfrastructureState, StageHash};

#[test]
fn load_missing_returns_empty_state() {
    let temp = TempDir::new().unwrap();
    let store = DeployStateStore::new(temp.path());

    let state = store.load().unwrap();

    assert!(state.profiles.is_empty());
    assert!(!store.state_path().exists());
}

#[test]
fn update_writes_camel_case_json_atomically() {
    let temp = TempDir::new().unwrap();
    let store = DeployStateStore::new(temp.path());

    store
        .update(|state| {
            let profile = state.profile_mut("default");
            profile.skill_id = Some("amzn1.ask.skill.X".to_string());
            profile.skill_metadata = StageHash::new("h1");
            profile.skill_infrastructure = Some(InfrastructureState {
                kind: "command".to_string(),
                deploy_state: json!({ "stack": "s" }),
            });
        })
        .unwrap();

    let path = temp.path().join(".skilldeploy/deploy-state.json");
    assert_eq!(store.state_path(), path);
    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["version"], 1);
    assert_eq!(raw["profiles"]["default"]["skillId"], "amzn1.ask.skill.X");
    assert_eq!(
        raw["profiles"]["default"]["skillMetadata"]["lastDeployHash"],
        "h1"
    );
    assert_eq!(
        raw["profiles"]["default"]["skillInfrastructure"]["type"],
        "command"
    );

    // No temp files left next to the state file.
    let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("deploy-state.json")]);
}

#[test]
fn updates_preserve_other_stages() {
    let temp = TempDir::new().unwrap();
    let store = DeployStateStore::new(temp.path());

    store
        .update(|state| {
            let profile = state.profile_mut("default");
            profile.skill_id = Some("id".to_string());
            profile.skill_metadata = StageHash::new("meta");
        })
        .unwrap();
    store
        .update(|state| {
            state
                .profile_mut("default")
                .code
                .insert("eu".to_string(), StageHash::new("code"));
        })
        .unwrap();

    let state = store.load().unwrap();
    assert_eq!(state.skill_id("default"), Some("id"));
    assert_eq!(state.hash_record("default").unwrap().last_deploy_hash, "meta");
    assert_eq!(
        state.profile("default").unwrap().code["eu"].last_deploy_hash.as_deref(),
        Some("code")
    );
}

#[test]
fn unsupported_version_is_rejected() {
    let temp = TempDir::new().unwrap();
    let store = DeployStateStore::new(temp.path());
    std::fs::create_dir_all(store.state_path().parent().unwrap()).unwrap();
    std::fs::write(
        store.state_path(),
        r#"{"version": 9, "updatedAt": "2024-01-01T00:00:00Z", "profiles": {}}"#,
    )
    .unwrap();

    let err = store.load().unwrap_err().to_string();
    assert!(err.contains("Unsupported deploy state version"), "{err}");
}
