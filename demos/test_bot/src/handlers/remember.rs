//! `remember`/`forget`/`recall`: per-user metadata kept in storage.

use pewter::framework::RegistrationResult;
use pewter::prelude::*;

const INFORMATION: &str = "information";

/// The sender as stored, or as the adapter described them if nothing was saved yet.
async fn stored_user(response: &Response) -> Result<User, BoxError> {
    let user = response.users().find_by_id(&response.user().id).await?;
    Ok(user.unwrap_or_else(|| response.user().clone()))
}

async fn remember(response: Response) -> Result<(), BoxError> {
    let thing = response.captures().get(1).unwrap_or_default().trim().to_string();

    let mut user = stored_user(&response).await?;
    user.metadata.insert(INFORMATION.to_string(), thing.clone());
    response.users().save(&user).await?;

    response.reply(format!("I have stored {thing} for future reference."));
    Ok(())
}

async fn forget(response: Response) -> Result<(), BoxError> {
    let mut user = stored_user(&response).await?;
    user.metadata.remove(INFORMATION);
    response.users().save(&user).await?;

    response.reply("I have forgotten all information about you!");
    Ok(())
}

async fn recall(response: Response) -> Result<(), BoxError> {
    let user = stored_user(&response).await?;
    let info = user.metadata.get(INFORMATION).map(String::as_str).unwrap_or_default();
    response.reply(format!("Here's what I know about you: \n{info}"));
    Ok(())
}

pub fn handler() -> RegistrationResult<Handler> {
    Handler::builder("remember")
        .route(
            Route::new(r"(?i)^remember\sthis\s(.+)$", "remember", remember)?
                .command(true)
                .help("remember", "Stores specified string as user metadata."),
        )
        .route(
            Route::new(r"(?i)^forget\sme$", "forget", forget)?
                .command(true)
                .help("forget", "Clears user metadata."),
        )
        .route(
            Route::new(r"(?i)^recall\smy\sinfo$", "recall", recall)?
                .command(true)
                .help("recall", "Reveals stored user metadata."),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use pewter::framework::Reply;

    use super::*;
    use crate::handlers::harness;

    fn public(text: &str) -> Vec<Reply> {
        vec![Reply::Public(vec![text.to_string()])]
    }

    #[tokio::test]
    async fn test_remember_then_recall() {
        let handler = Arc::new(handler().unwrap());
        let users = harness::users();

        let replies = harness::send(&handler, &users, "remember this  blue ").await;
        assert_eq!(replies, public("I have stored blue for future reference."));

        let stored = users.find_by_id("1").await.unwrap().unwrap();
        assert_eq!(stored.metadata.get(INFORMATION).map(String::as_str), Some("blue"));
        assert_eq!(stored.name, "Shell User");

        let replies = harness::send(&handler, &users, "recall my info").await;
        assert_eq!(replies, public("Here's what I know about you: \nblue"));
    }

    #[tokio::test]
    async fn test_forget_clears_information() {
        let handler = Arc::new(handler().unwrap());
        let users = harness::users();

        harness::send(&handler, &users, "remember this red").await;
        let replies = harness::send(&handler, &users, "FORGET ME").await;
        assert_eq!(replies, public("I have forgotten all information about you!"));

        let stored = users.find_by_id("1").await.unwrap().unwrap();
        assert!(!stored.metadata.contains_key(INFORMATION));

        let replies = harness::send(&handler, &users, "recall my info").await;
        assert_eq!(replies, public("Here's what I know about you: \n"));
    }

    #[tokio::test]
    async fn test_unrelated_text_is_ignored() {
        let handler = Arc::new(handler().unwrap());
        let replies = harness::send(&handler, &harness::users(), "remember that").await;
        assert!(replies.is_empty());
    }
}
