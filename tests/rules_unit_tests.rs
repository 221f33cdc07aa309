//! Unit tests for the classification rules of version control sections

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "This is a test module")]
mod tests {

use agent_config::config::Options;
use agent_config::form::rules::{DeriveContext, Derived, Rule};
use agent_config::form::{FieldValue, FormRegistry, SectionKind};
use agent_config::store::{ConfigDocument, StoreName, Storage};
use agent_config::system::MockSystem;

fn derive(credentials: &str, rule: Rule) -> Derived {
    let system = MockSystem::new();
    let options = Options::rooted("/agent");
    let storage = Storage::new(&system, &options);
    let registry = FormRegistry::load(&system, None).unwrap();
    let settings = ConfigDocument::new();
    let credentials = ConfigDocument::parse(credentials);
    let context = DeriveContext {
        settings: &settings,
        credentials: &credentials,
        storage: &storage,
        registry: &registry,
        clone_index: 1,
        sections: Some(SectionKind::VersionControl),
        submitted: None,
    };
    context.derive(rule).unwrap()
}

fn text(value: &str) -> Derived {
    Derived::Value(FieldValue::text(value))
}

#[test]
fn test_type_precedence() {
    let cases = [
        ("tfs=true\ngithub_token=gh\n", "tfs"),
        ("tfs=coll\ngitlab_token=gl\n", "tfs"),
        ("gitlab_token=gl\ngithub_token=gh\n", "gitlab"),
        ("group=grp\n", "gitlab"),
        ("github_token=gh\nenv=SOURCE_0_CREDENTIALS_ENV\n", "github"),
        ("env=SOURCE_0_CREDENTIALS_ENV\n", "git"),
        ("username=u\npassword=p\n", "subversion"),
        ("tfs=-\ngitlab_token=-\ngithub_token=-\nenv=-\n", "subversion"),
    ];
    for (options, expected) in cases {
        let credentials = format!("[vcs.example]\n{options}");
        assert_eq!(
            derive(&credentials, Rule::VersionControlType),
            text(expected),
            "{options:?}"
        );
    }
}

#[test]
fn test_stored_type_beats_markers() {
    assert_eq!(
        derive("[vcs.example]\ntype=tfs\ngithub_token=gh\n", Rule::VersionControlType),
        text("tfs")
    );
}

#[test]
fn test_foreign_section_has_no_type() {
    let system = MockSystem::new();
    let options = Options::rooted("/agent");
    let storage = Storage::new(&system, &options);
    let registry = FormRegistry::load(&system, None).unwrap();
    let settings = ConfigDocument::new();
    let credentials = ConfigDocument::parse("[jira.example]\ntype=jira\n");
    let context = DeriveContext {
        settings: &settings,
        credentials: &credentials,
        storage: &storage,
        registry: &registry,
        clone_index: 1,
        sections: Some(SectionKind::VersionControl),
        submitted: None,
    };
    assert!(context.derive(Rule::VersionControlType).is_err());
}

#[test]
fn test_auth_precedence() {
    let cases = [
        ("github_token=gh\ngitlab_token=gl\n", "github_api"),
        ("gitlab_token=gl\nenv=SOURCE_0_CREDENTIALS_ENV\n", "gitlab_api"),
        ("env=SOURCE_0_CREDENTIALS_ENV\nusername=u\n", "deploy_key"),
        ("env=-\nusername=u\n", "user_pass"),
        ("env=-\nusername=-\n", "none"),
    ];
    for (options, expected) in cases {
        let credentials = format!("[vcs.example]\n{options}");
        assert_eq!(
            derive(&credentials, Rule::VersionControlAuth),
            text(expected),
            "{options:?}"
        );
    }
}

#[test]
fn test_token_precedence() {
    assert_eq!(
        derive(
            "[vcs.example]\npassword=p\ngithub_token=gh\n",
            Rule::VersionControlToken
        ),
        Derived::Lookup {
            store: StoreName::Credentials,
            section: "vcs.example".to_owned(),
            option: "password".to_owned(),
        }
    );
    assert_eq!(
        derive(
            "[vcs.example]\npassword=-\ngithub_token=-\ngitlab_token=gl\n",
            Rule::VersionControlToken
        ),
        Derived::Lookup {
            store: StoreName::Credentials,
            section: "vcs.example".to_owned(),
            option: "gitlab_token".to_owned(),
        }
    );
    assert_eq!(
        derive("[vcs.example]\npassword=-\n", Rule::VersionControlToken),
        Derived::Nothing
    );
}

#[test]
fn test_domain_is_positional_section() {
    assert_eq!(
        derive(
            "[first.example]\ntype=gitlab\n[second.example]\ntype=github\n",
            Rule::VersionControlDomain
        ),
        text("first.example")
    );
}

}
