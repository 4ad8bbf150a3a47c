//! Parsing of command lines.
//!
//! One command per line, words separated by whitespace, case-insensitive:
//!
//! ```text
//! pause | resume | next | prev | clear
//! play song <id>... | play album <id>
//! add song <id>...  | add album <id>
//! seek <seconds>
//! list song | list liked | list album [<id>]
//! progress | current | queue
//! like <id> | is_liked <id> | listened <id>
//! ```

use std::str::FromStr;

use thiserror::Error;

use crate::library::{AlbumId, TrackId};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Pause,
    Resume,
    PlaySongs(Vec<TrackId>),
    PlayAlbum(AlbumId),
    AddSongs(Vec<TrackId>),
    AddAlbum(AlbumId),
    Next,
    Prev,
    Seek(f64),
    Clear,
    ListSongs,
    ListLiked,
    ListAlbums,
    ListAlbum(AlbumId),
    Progress,
    Current,
    Queue,
    Like(TrackId),
    IsLiked(TrackId),
    Listened(TrackId),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("wrong music object type {found:?}, allowed types: {allowed}")]
    WrongObjectType {
        found: String,
        allowed: &'static str,
    },

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("invalid position: {0}")]
    InvalidPosition(String),

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim().to_ascii_lowercase();
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(ParseError::Empty)?;
        let args: Vec<&str> = words.collect();

        let command = match name {
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "next" => Command::Next,
            "prev" => Command::Prev,
            "clear" => Command::Clear,
            "progress" => Command::Progress,
            "current" => Command::Current,
            "queue" => Command::Queue,
            "play" => match object(&args, "song, album")? {
                ("song", ids) => Command::PlaySongs(track_ids(ids)?),
                (_, ids) => Command::PlayAlbum(single_id(ids, "album id")?),
            },
            "add" => match object(&args, "song, album")? {
                ("song", ids) => Command::AddSongs(track_ids(ids)?),
                (_, ids) => Command::AddAlbum(single_id(ids, "album id")?),
            },
            "seek" => {
                let position = single(&args, "position")?;
                let seconds = position
                    .parse::<f64>()
                    .ok()
                    .filter(|s| s.is_finite())
                    .ok_or_else(|| ParseError::InvalidPosition(position.to_string()))?;
                Command::Seek(seconds)
            }
            "list" => {
                let (kind, rest) = args
                    .split_first()
                    .ok_or(ParseError::Missing("music object type"))?;
                match *kind {
                    "song" | "liked" => {
                        no_more(rest)?;
                        if *kind == "song" {
                            Command::ListSongs
                        } else {
                            Command::ListLiked
                        }
                    }
                    "album" if rest.is_empty() => Command::ListAlbums,
                    "album" => Command::ListAlbum(single_id(rest, "album id")?),
                    other => {
                        return Err(ParseError::WrongObjectType {
                            found: other.to_string(),
                            allowed: "song, liked, album",
                        });
                    }
                }
            }
            "like" => Command::Like(single_id(&args, "song id")?),
            "is_liked" => Command::IsLiked(single_id(&args, "song id")?),
            "listened" => Command::Listened(single_id(&args, "song id")?),
            other => return Err(ParseError::UnknownCommand(other.to_string())),
        };

        if matches!(
            command,
            Command::Pause
                | Command::Resume
                | Command::Next
                | Command::Prev
                | Command::Clear
                | Command::Progress
                | Command::Current
                | Command::Queue
        ) {
            no_more(&args)?;
        }
        Ok(command)
    }
}

/// Split `song <ids>` / `album <id>`; returns the kind and the remaining words.
fn object<'a>(
    args: &'a [&'a str],
    allowed: &'static str,
) -> Result<(&'a str, &'a [&'a str]), ParseError> {
    let (kind, rest) = args
        .split_first()
        .ok_or(ParseError::Missing("music object type"))?;
    match *kind {
        "song" | "album" => Ok((*kind, rest)),
        other => Err(ParseError::WrongObjectType {
            found: other.to_string(),
            allowed,
        }),
    }
}

fn parse_id(word: &str) -> Result<i64, ParseError> {
    word.parse::<i64>()
        .map_err(|_| ParseError::InvalidId(word.to_string()))
}

fn track_ids(words: &[&str]) -> Result<Vec<TrackId>, ParseError> {
    if words.is_empty() {
        return Err(ParseError::Missing("song ids"));
    }
    words.iter().map(|w| parse_id(w)).collect()
}

fn single<'a>(words: &[&'a str], what: &'static str) -> Result<&'a str, ParseError> {
    match words {
        [] => Err(ParseError::Missing(what)),
        [word] => Ok(*word),
        [_, extra, ..] => Err(ParseError::UnexpectedArgument(extra.to_string())),
    }
}

fn single_id(words: &[&str], what: &'static str) -> Result<i64, ParseError> {
    parse_id(single(words, what)?)
}

fn no_more(words: &[&str]) -> Result<(), ParseError> {
    match words.first() {
        Some(extra) => Err(ParseError::UnexpectedArgument(extra.to_string())),
        None => Ok(()),
    }
}
