use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::{Platform, QueueStatus, WordpressStatus};

#[derive(Parser)]
#[command(name = "draftdesk", about = "Draft desk — edit, guard and publish content sessions")]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the configuration file
    Validate,

    /// Show a session, its drafts and guardrail checks
    Show {
        /// Session ID
        session_id: String,
    },

    /// Edit a draft from stdin, one line at a time, with debounced autosave
    Edit {
        /// Session ID
        session_id: String,

        /// Platform draft to edit
        #[arg(long, short)]
        platform: Platform,
    },

    /// Edit the tweets of a Twitter thread
    Tweet {
        /// Session ID
        session_id: String,

        #[command(subcommand)]
        action: TweetAction,
    },

    /// Set the duration of a reel scene (clamped to 1-120 seconds)
    Scene {
        /// Session ID
        session_id: String,

        /// Scene ID
        scene_id: String,

        /// Duration in seconds
        #[arg(long)]
        duration: u32,
    },

    /// Request auto-fixes for guardrail violations
    Fix {
        /// Session ID
        session_id: String,

        /// Platform draft the violations belong to
        #[arg(long, short)]
        platform: Platform,

        /// Violation IDs (defaults to every auto-fixable violation)
        violation_ids: Vec<String>,
    },

    /// Publish or schedule a session
    Publish {
        /// Session ID
        session_id: String,

        /// Platforms to publish to (repeatable)
        #[arg(long = "platform", short, required = true)]
        platforms: Vec<Platform>,

        /// Schedule date (YYYY-MM-DD); publishes now when omitted
        #[arg(long, requires = "time")]
        date: Option<String>,

        /// Schedule time (HH:MM)
        #[arg(long, requires = "date")]
        time: Option<String>,

        /// WordPress post status for articles
        #[arg(long, default_value = "publish")]
        wordpress_status: WordpressStatus,
    },

    /// Show the publish queue
    Queue {
        /// Only items with this status
        #[arg(long)]
        status: Option<QueueStatus>,

        /// Keep polling and print status changes
        #[arg(long)]
        watch: bool,
    },

    /// Retry a failed queue item
    Retry {
        /// Queue item ID
        item_id: String,
    },

    /// Cancel a pending queue item
    Cancel {
        /// Queue item ID
        item_id: String,
    },

    /// List integrations and their connection status
    Integrations,
}

#[derive(Subcommand)]
pub enum TweetAction {
    /// Append a tweet to the thread
    Add {
        /// Tweet text
        content: String,
    },

    /// Delete a tweet; the remaining tweets are renumbered
    Delete {
        /// Tweet ID
        tweet_id: String,
    },
}
