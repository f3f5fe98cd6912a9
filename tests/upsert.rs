use gatewire::config::{CacheTtls, DynamicConfig};
use gatewire::entities::{Field, Merge, Role, Snowflake, User};
use gatewire::state::{upsert_seq, upsert_seq_entity, EntityKind};
use gatewire::{Collection, ManualClock};
use std::sync::Arc;
use std::thread;

fn store() -> Collection<Snowflake, User> {
    Collection::new(
        EntityKind::User,
        DynamicConfig::new(CacheTtls::unbounded()),
        Arc::new(ManualClock::new(0)),
    )
}

fn field(v: Option<Option<&str>>) -> Field<String> {
    match v {
        None => Field::Missing,
        Some(None) => Field::Null,
        Some(Some(s)) => Field::Present(s.to_string()),
    }
}

const SHAPES: [Option<Option<&str>>; 4] = [None, Some(None), Some(Some("a")), Some(Some("b"))];

#[test]
fn stored_value_is_merge_of_existing_and_new_for_every_field_shape() {
    for old in SHAPES {
        for new in SHAPES {
            let s = store();
            let existing = User { id: Snowflake(1), username: field(old), ..Default::default() };
            let update = User { id: Snowflake(1), username: field(new), ..Default::default() };
            s.upsert(Snowflake(1), existing.clone());
            let stored = s.upsert(Snowflake(1), update.clone());

            assert_eq!(stored, existing.merge(update.clone()));
            let expected = if update.username.is_missing() { field(old) } else { field(new) };
            assert_eq!(s.get(&Snowflake(1)).unwrap().username, expected);
        }
    }
}

#[test]
fn first_upsert_stores_the_value_as_is() {
    let s = store();
    let u = User { id: Snowflake(3), bot: Field::Null, ..Default::default() };
    assert_eq!(s.upsert(Snowflake(3), u.clone()), u);
}

#[test]
fn concurrent_partial_upserts_to_one_key_all_land() {
    let s = store();
    s.upsert(Snowflake(1), User { id: Snowflake(1), ..Default::default() });

    let writers: Vec<_> = (0..4)
        .map(|i| {
            let s = s.clone();
            thread::spawn(move || {
                for _ in 0..250 {
                    let mut u = User { id: Snowflake(1), ..Default::default() };
                    match i {
                        0 => u.username = Field::Present("name".into()),
                        1 => u.avatar = Field::Present("hash".into()),
                        2 => u.global_name = Field::Present("global".into()),
                        _ => u.bot = Field::Present(true),
                    }
                    s.upsert(Snowflake(1), u);
                }
            })
        })
        .collect();
    for w in writers {
        w.join().unwrap();
    }

    let u = s.get(&Snowflake(1)).unwrap();
    assert_eq!(u.username, Field::Present("name".into()));
    assert_eq!(u.avatar, Field::Present("hash".into()));
    assert_eq!(u.global_name, Field::Present("global".into()));
    assert_eq!(u.bot, Field::Present(true));
    assert_eq!(s.len(), 1);
}

#[test]
fn sequence_upsert_merges_in_place_and_appends_new_keys() {
    let role = |id: u64, name: Option<&str>, pos: Option<i64>| Role {
        id: Snowflake(id),
        name: name.map_or(Field::Missing, |n| Field::Present(n.to_string())),
        position: pos.map_or(Field::Missing, Field::Present),
        ..Default::default()
    };
    let mut roles = vec![role(1, Some("admin"), Some(3)), role(2, Some("mod"), Some(2))];

    let stored = upsert_seq_entity(&mut roles, role(1, None, Some(5)));
    assert_eq!(stored.name, Field::Present("admin".into()));
    assert_eq!(stored.position, Field::Present(5));
    assert_eq!(roles[0], stored);

    upsert_seq_entity(&mut roles, role(9, Some("new"), None));
    assert_eq!(roles.len(), 3);
    assert_eq!(roles[2].id, Snowflake(9));

    // Keyed by an arbitrary projection.
    let by_name = upsert_seq(&mut roles, &"mod".to_string(), role(2, None, Some(0)), |r| {
        r.name.as_option().cloned()
    });
    assert_eq!(by_name.position, Field::Present(0));
    assert_eq!(roles.len(), 3);
}
