mod http_tests;
mod split_tests;

use crate::core::models::group::NewGroup;
use crate::core::models::participant::RosterEntry;
use crate::core::models::user::User;
use crate::infrastructure::api::{GroupApi, RequestContext, in_memory::InMemoryBackend};

pub const BASE_URL: &str = "http://localhost:3000";

/// Roster whose ids are the lowercased names.
pub fn roster(names: &[&str]) -> Vec<RosterEntry> {
    names
        .iter()
        .map(|name| RosterEntry {
            id: name.to_lowercase(),
            display_name: name.to_string(),
        })
        .collect()
}

pub struct Fixture {
    pub backend: InMemoryBackend,
    pub ctx: RequestContext,
    pub alice: User,
    pub bob: User,
    pub carol: User,
    pub group_id: String,
}

/// Backend with Alice, Bob and Carol in one group, signed in as Alice.
pub async fn create_fixture() -> Fixture {
    let _ = env_logger::try_init();
    let backend = InMemoryBackend::new();
    let alice = backend.add_user("alice", "secret", "Alice").await;
    let bob = backend.add_user("bob", "secret", "Bob").await;
    let carol = backend.add_user("carol", "secret", "Carol").await;
    let token = backend.issue_token(&alice.id).await;
    let ctx = RequestContext::anonymous(BASE_URL).with_token(token);

    let group = backend
        .create_group(
            &ctx,
            &NewGroup {
                name: "Da Lat trip".to_string(),
                emoji: None,
                description: None,
            },
        )
        .await
        .unwrap();
    backend.add_member(&group.id, &bob.id).await.unwrap();
    backend.add_member(&group.id, &carol.id).await.unwrap();

    Fixture {
        backend,
        ctx,
        alice,
        bob,
        carol,
        group_id: group.id,
    }
}
