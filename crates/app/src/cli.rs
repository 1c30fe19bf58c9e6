use clap::{Parser, Subcommand};
use murmur_core::domain::posts::Privacy;
use murmur_core::domain::reactions::ReactionKind;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Use the seeded in-memory backend instead of the REST API.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,
    /// Print results as JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the feed.
    Feed {
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Show a post with its comments.
    Post { id: String },
    /// Toggle the like on a post.
    Like { id: String },
    /// Toggle the saved flag on a post.
    Save { id: String },
    /// Pick a reaction; picking the current one removes it.
    React { id: String, kind: ReactionKind },
    /// Comment on a post, or reply to one of its comments.
    Comment {
        id: String,
        text: String,
        #[arg(long)]
        reply_to: Option<String>,
    },
    /// Edit one of your posts.
    Edit {
        id: String,
        content: String,
        #[arg(long)]
        privacy: Option<Privacy>,
    },
    /// Delete one of your posts.
    Delete { id: String },
    /// List notifications. Pages after the second load as if scrolled to.
    Notifications {
        #[arg(long, default_value_t = 1)]
        pages: u32,
        /// Mark one notification as read.
        #[arg(long)]
        read: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use murmur_core::domain::reactions::ReactionKind;

    use super::{Cli, Command};

    #[test]
    fn parses_reaction_kind_and_global_mock() {
        let cli = Cli::parse_from(["murmur", "react", "p-1", "love", "--mock"]);
        assert!(cli.mock);
        match cli.command {
            Command::React { id, kind } => {
                assert_eq!(id, "p-1");
                assert_eq!(kind, ReactionKind::Love);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_reply() {
        let cli = Cli::parse_from(["murmur", "comment", "p-3", "me too", "--reply-to", "c-2"]);
        assert!(!cli.mock);
        match cli.command {
            Command::Comment { reply_to, text, .. } => {
                assert_eq!(reply_to.as_deref(), Some("c-2"));
                assert_eq!(text, "me too");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_reaction() {
        assert!(Cli::try_parse_from(["murmur", "react", "p-1", "meh"]).is_err());
    }
}
