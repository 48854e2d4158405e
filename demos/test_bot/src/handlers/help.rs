//! `help`: lists the usage of every registered route.

use std::sync::Weak;

use pewter::framework::RegistrationResult;
use pewter::prelude::*;

/// One `usage - description` line per help entry, in registration order.
pub fn help_lines(registry: &Registry) -> Vec<String> {
    registry
        .handlers()
        .iter()
        .flat_map(|handler| handler.routes().iter())
        .flat_map(|route| route.help_entries().iter())
        .map(|(usage, description)| format!("{usage} - {description}"))
        .collect()
}

/// Builds the handler; it reads from `registry` at reply time.
pub fn handler(registry: Weak<Registry>) -> RegistrationResult<Handler> {
    let action = move |response: Response| {
        let registry = registry.clone();
        async move {
            let Some(registry) = registry.upgrade() else {
                return Ok::<_, BoxError>(());
            };
            response.reply_privately(help_lines(&registry).join("\n"));
            Ok(())
        }
    };

    Handler::builder("help")
        .route(
            Route::new(r"(?i)^help$", "help", action)?
                .command(true)
                .help("help", "Lists the commands the robot understands."),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use pewter::framework::Reply;

    use super::*;
    use crate::handlers::{harness, ping, remember};

    #[tokio::test]
    async fn test_help_lists_all_routes() {
        let registry = Arc::new(Registry::new());
        registry.register_handler(ping::handler().unwrap());
        registry.register_handler(remember::handler().unwrap());
        let help = Arc::new(handler(Arc::downgrade(&registry)).unwrap());
        registry.register_handler(Arc::clone(&help));

        let replies = harness::send(&help, &harness::users(), "help").await;
        let [Reply::Private(lines)] = replies.as_slice() else {
            panic!("expected one private reply, got {replies:?}");
        };
        let text = &lines[0];
        assert!(text.starts_with("ping - Pongs back"));
        assert!(text.contains("remember - Stores specified string as user metadata."));
        assert!(text.contains("recall - Reveals stored user metadata."));
        assert!(text.ends_with("help - Lists the commands the robot understands."));
    }
}
