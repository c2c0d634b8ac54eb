//! Help command - lists console commands.

use crate::commands::CommandHandler;
use crate::error::AppResult;
use async_trait::async_trait;

pub struct HelpHandler;

#[async_trait]
impl CommandHandler for HelpHandler {
    fn trigger(&self) -> &str {
        "help"
    }

    async fn execute(&self, _args: &[String]) -> AppResult<String> {
        Ok(r#"Commands:
  rent <provider> [carrier]  Rent a number (carrier defaults to random)
  list                       Show all rental sessions
  show <id>                  Reveal a session's code for a few seconds
  cancel <id>                Cancel a rental that has no code yet
  complete <id>              Mark a received code as used
  providers                  List providers and their carriers
  key                        Toggle the API key display
  help                       Show this message
  quit                       Stop polling and exit

Session ids may be shortened to any unique prefix."#
            .into())
    }
}
