//! Demo data for local development.

use tracing::info;

use sharerides_core::{Email, Rating, StoryInput};
use sharerides_server::db::{IdentityStore, PgIdentityStore, PgStoryStore, StoryStore};
use sharerides_server::models::{CurrentUser, NewStory};

const PLATES: [&str; 5] = ["GR-1234-24", "ABC123", "XYZ789", "KA-01-AB-1234", "7ABC123"];

const STORIES: [(&str, Rating); 5] = [
    (
        "Driver was friendly and helped with my luggage.",
        Rating::Positive,
    ),
    ("Quiet ride, arrived on time.", Rating::Neutral),
    (
        "Took a long detour and ignored the navigation.",
        Rating::Negative,
    ),
    ("Car was spotless and the AC worked great.", Rating::Positive),
    ("Was on the phone the entire trip.", Rating::Negative),
];

/// Endless demo stories. Each pass over the plates starts one text later.
fn demo_stories() -> impl Iterator<Item = StoryInput> {
    (0..STORIES.len())
        .cycle()
        .flat_map(|round| PLATES.iter().zip(STORIES.iter().cycle().skip(round)))
        .enumerate()
        .map(|(n, (plate, (text, rating)))| {
            let input = StoryInput::new(*plate, *text, *rating);
            if n % 2 == 0 {
                input.with_location("Downtown")
            } else {
                input
            }
        })
}

/// Insert `count` demo stories owned by `email`, creating the user if needed.
///
/// # Errors
///
/// Returns an error if the database URL is missing or a query fails.
pub async fn stories(count: u32, email: &str) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;
    let pool = sharerides_server::db::create_pool(&database_url)?;

    let identities = PgIdentityStore::new(pool.clone());
    let stories = PgStoryStore::new(pool.clone());

    let email = Email::parse(email)?;
    let user = match identities.find_user_by_email(&email).await? {
        Some(user) => user,
        None => identities.create_verified_user(&email).await?,
    };
    info!(user_id = %user.id, email = %email, "Seeding stories");

    let owner = CurrentUser {
        id: user.id,
        email: user.email,
    };

    for input in demo_stories().take(usize::try_from(count)?) {
        let story = stories
            .insert(NewStory {
                content: input.validate()?,
                owner: owner.clone(),
            })
            .await?;
        info!(story_id = %story.id, plate = %story.plate_number, "Inserted story");
    }

    pool.close().await;
    info!(count, "Seeding complete!");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_stories_are_valid() {
        for (n, input) in demo_stories().take(60).enumerate() {
            assert!(input.validate().is_ok(), "story {n}");
        }
    }

    #[test]
    fn test_demo_stories_vary() {
        let first: Vec<StoryInput> = demo_stories().take(6).collect();
        let [a, b, _, _, _, f] = <[StoryInput; 6]>::try_from(first).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.plate_number, f.plate_number);
        assert_ne!(a.story, f.story);
        assert!(a.location.is_some());
        assert!(b.location.is_none());
    }
}
