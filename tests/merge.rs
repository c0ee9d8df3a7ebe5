// =============================================================================
// Matrixon Character Profiles - Merge Scenarios
// =============================================================================
//
// Project: Matrixon - Character Profiles
// Author: arkSong (arksong2018@gmail.com) - Founder of Matrixon Innovation Project
// Contributors: Matrixon Development Team
// Date: 2024-12-11
// Version: 0.11.0-alpha
// License: Apache 2.0 / MIT
//
// Description:
//   Behaviour of `make X into Y` for every combination of source and
//   target profile status, with and without messages.
//
// Features:
//   • Confirmation before any change
//   • Renames into unused identifiers
//   • Backlinks surviving delete and recreate
//
// =============================================================================

mod common;

use common::{shown_as, World, TOWN_SQUARE};
use matrixon_characters::Post;
use test_log::test;

#[derive(Clone, Copy, Debug)]
enum Status {
    Character,
    Me,
    Corrupt,
    Nonexistent,
}

struct Side {
    identifier: &'static str,
    name: &'static str,
    posts: Vec<Post>,
}

/// Brings `identifier` into `status` after `count` messages used it
fn prepare(world: &World, identifier: &'static str, name: &'static str, status: Status, count: usize) -> Side {
    if let Status::Me = status {
        let posts = (0..count)
            .map(|i| world.post(TOWN_SQUARE, &format!("plain message {i}")))
            .collect();
        return Side { identifier: "me", name: "user-number-one", posts };
    }

    let picture = world.picture_post(&format!("{identifier}.png"));
    world
        .run(TOWN_SQUARE, &picture.id, &format!("/character picture {identifier}={name}"), true)
        .unwrap();
    let posts = (0..count)
        .map(|i| world.post(TOWN_SQUARE, &format!("{identifier}: message {i}")))
        .collect();
    match status {
        Status::Corrupt => world.host.delete_post(&picture.id).unwrap(),
        Status::Nonexistent => {
            world.exec(&format!("/character delete {identifier}"));
        }
        _ => {}
    }
    Side { identifier, name, posts }
}

fn displayed(world: &World, post: &Post) -> Option<(String, String)> {
    shown_as(&world.get(&post.id))
}

fn assert_unchanged(world: &World, side: &Side) {
    for post in &side.posts {
        assert_eq!(displayed(world, post), shown_as(post), "post {} changed", post.id);
    }
}

fn assert_shown_as(world: &World, side: &Side, expected: &Option<(String, String)>) {
    for post in &side.posts {
        assert_eq!(&displayed(world, post), expected, "post {}", post.id);
    }
}

struct Case {
    source: (Status, usize),
    target: (Status, usize),
    outcome: Result<&'static str, &'static str>,
}

fn run_case(case: &Case) {
    let world = World::new();
    let source = prepare(&world, "alpha", "Alpha", case.source.0, case.source.1);
    let target = prepare(&world, "bravo", "Bravo", case.target.0, case.target.1);
    let command = format!("/character make {} into {}", source.identifier, target.identifier);

    match case.outcome {
        Err(message) => {
            for confirmed in [false, true] {
                let err = world
                    .run(TOWN_SQUARE, "", &command, confirmed)
                    .expect_err(&format!("{:?} into {:?}", case.source, case.target));
                assert_eq!(err.to_string(), message);
                assert_eq!(err.user_message(), format!("Character Profiles: {message}"));
            }
            assert_unchanged(&world, &source);
            assert_unchanged(&world, &target);
        }
        Ok(message) => {
            let prompt = world.run(TOWN_SQUARE, "", &command, false).unwrap();
            assert!(prompt.is_prompt(), "{:?} into {:?} ran unconfirmed", case.source, case.target);
            assert_unchanged(&world, &source);
            assert_unchanged(&world, &target);

            let response = world.run(TOWN_SQUARE, "", &command, true).unwrap();
            assert_eq!(response.text, message);
            assert_eq!(response.attachments.len(), 1);

            let expected = match case.target.0 {
                Status::Me => None,
                Status::Nonexistent => Some((target.identifier.to_owned(), source.name.to_owned())),
                _ => Some((target.identifier.to_owned(), target.name.to_owned())),
            };
            assert_shown_as(&world, &source, &expected);
            if let Status::Character = case.target.0 {
                assert_shown_as(&world, &target, &expected);
            }
            assert_eq!(world.count(source.identifier), 0);
            assert!(world.exec_err(&format!("/character delete {}", source.identifier)).ends_with("does not exist."));
        }
    }
}

#[test]
fn test_make_into_outcomes() {
    use Status::*;
    let cases = [
        Case {
            source: (Character, 0),
            target: (Character, 2),
            outcome: Err("Character profile `alpha` isn't used by any messages. You can delete it with `/character delete alpha`."),
        },
        Case {
            source: (Character, 2),
            target: (Character, 2),
            outcome: Ok("All messages that used character profile `alpha` now use character profile `bravo` instead. Character profile `alpha` has been deleted."),
        },
        Case {
            source: (Character, 2),
            target: (Character, 0),
            outcome: Ok("All messages that used character profile `alpha` now use character profile `bravo` instead. Character profile `alpha` has been deleted."),
        },
        Case {
            source: (Character, 2),
            target: (Me, 2),
            outcome: Ok("All messages that used character profile `alpha` now use your real profile instead. Character profile `alpha` has been deleted."),
        },
        Case {
            source: (Character, 2),
            target: (Corrupt, 2),
            outcome: Err("Target character profile `bravo` is corrupt."),
        },
        Case {
            source: (Character, 2),
            target: (Nonexistent, 0),
            outcome: Ok("Changed identifier for character profile `alpha` to `bravo`."),
        },
        Case {
            source: (Character, 2),
            target: (Nonexistent, 2),
            outcome: Err("Target character profile `bravo` doesn't exist, but since it is still used by 2 messages you must recreate it before you can make another character profile into it."),
        },
        Case {
            source: (Me, 2),
            target: (Character, 2),
            outcome: Err("Cannot make your real profile into something else. Use the built-in functionality to change the display name or profile picture for your real profile."),
        },
        Case {
            source: (Corrupt, 0),
            target: (Character, 2),
            outcome: Err("Character profile `alpha` is corrupt, and isn't used by any messages. You can delete it with `/character delete alpha`."),
        },
        Case {
            source: (Corrupt, 2),
            target: (Character, 2),
            outcome: Err("Character profile `alpha` is corrupt, but is still used by 2 messages. Before you try to make this character profile into something else, you need to delete and recreate it. The messages will not be affected by deleting the profile."),
        },
        Case {
            source: (Nonexistent, 0),
            target: (Character, 2),
            outcome: Err("Character profile `alpha` doesn't exist, and isn't used by any messages."),
        },
        Case {
            source: (Nonexistent, 2),
            target: (Character, 2),
            outcome: Err("Character profile `alpha` doesn't exist, but is still used by 2 messages. Create a character profile with this identifier in order to manage those messages."),
        },
    ];
    for case in &cases {
        run_case(case);
    }
}

#[test]
fn test_make_into_itself() {
    let world = World::new();
    world.exec("/character haddock=Captain Haddock");
    assert_eq!(
        world.exec_err("/character make haddock into haddock"),
        "Cannot make `haddock` into itself."
    );
}

#[test]
fn test_rename_keeps_picture_and_name() {
    let world = World::new();
    let picture = world.picture_post("haddock.png");
    world
        .run(TOWN_SQUARE, &picture.id, "/character picture haddock=Captain Haddock", true)
        .unwrap();
    let first = world.post(TOWN_SQUARE, "haddock: Blistering barnacles!");
    let second = world.post(TOWN_SQUARE, "haddock: Thundering typhoons!");
    assert_eq!(world.count("haddock"), 2);
    assert_eq!(world.count("milou"), 0);

    let prompt = world
        .run(TOWN_SQUARE, "", "/character make haddock into milou", false)
        .unwrap();
    assert!(prompt.is_prompt());
    assert_eq!(
        prompt.attachments[0].text,
        "Change the identifier of character profile `haddock` to `milou`? All 2 messages that use `haddock` will use `milou` instead."
    );
    assert_eq!(world.count("haddock"), 2);

    let response = world
        .run(TOWN_SQUARE, "", "/character make haddock into milou", true)
        .unwrap();
    assert_eq!(response.text, "Changed identifier for character profile `haddock` to `milou`.");
    assert_eq!(world.count("haddock"), 0);
    assert_eq!(world.count("milou"), 2);

    for post in [&first, &second] {
        let post = world.get(&post.id);
        assert_eq!(
            shown_as(&post),
            Some(("milou".to_owned(), "Captain Haddock".to_owned()))
        );
        let icon = post.prop_str("override_icon_url").unwrap_or_default();
        assert!(icon.contains("/profile/") && icon.contains("/milou?rk="), "{icon}");
    }
}

#[test]
fn test_backlinks_survive_delete_and_recreate() {
    let world = World::new();
    world.exec("/character haddock=Captain Haddock");
    let post = world.post(TOWN_SQUARE, "haddock: Blistering barnacles!");

    let prompt = world
        .run(TOWN_SQUARE, "", "/character delete haddock", false)
        .unwrap();
    assert!(prompt.is_prompt());
    assert!(prompt.attachments[0].text.starts_with("Character profile `haddock` is still used by 1 messages."));

    let response = world.exec("/character delete haddock");
    assert_eq!(response.text, "Deleted character profile `haddock`.");
    assert_eq!(world.count("haddock"), 1);
    assert_eq!(
        shown_as(&world.get(&post.id)),
        Some(("haddock".to_owned(), "Captain Haddock".to_owned()))
    );

    world.exec("/character haddock=Archibald Haddock");
    assert_eq!(
        shown_as(&world.get(&post.id)),
        Some(("haddock".to_owned(), "Archibald Haddock".to_owned()))
    );
}
