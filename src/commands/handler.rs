//! Command Dispatcher
//!
//! Receives decoded commands (`[name, arg, ...]`), validates them, runs them
//! against the [`StorageEngine`] and returns the reply.
//!
//! ## Supported Commands
//!
//! ### Strings
//! - `SET key value [EX seconds | PX milliseconds] [NX | XX]`
//! - `GET key`
//! - `INCR key`
//! - `MSET key value [key value ...]`
//!
//! ### Lists
//! - `LPUSH key value [value ...]` / `RPUSH key value [value ...]`
//! - `LPOP key` / `RPOP key`
//! - `LRANGE key start stop` (both bounds inclusive)
//!
//! ### Sets and Hashes
//! - `SADD key member [member ...]`
//! - `SPOP key`
//! - `HSET key field value [field value ...]`
//!
//! ### Keys
//! - `DEL key [key ...]`, `EXISTS key [key ...]`, `TYPE key`
//! - `TTL key`, `PTTL key`
//!
//! ### Server
//! - `PING [message]`, `ECHO message`, `COMMAND`
//! - `DBSIZE`, `FLUSHDB`, `FLUSHALL`
//!
//! Every handler checks arity and parses its options before it touches the
//! store, so a rejected command never leaves a partial write behind.

use crate::protocol::RespValue;
use crate::storage::engine::parse_i64;
use crate::storage::{
    Expiry, ExpiryError, KeyTtl, SetCondition, SetOptions, StorageEngine, StorageError,
};
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors a command can fail with. The `Display` text is the wire message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Malformed `SET` option list
    #[error("ERR syntax error")]
    Syntax,

    /// A numeric argument or stored counter failed to parse
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    /// `EX`/`PX` duration was zero, negative or past the representable range
    #[error("ERR invalid expire time in 'set' command")]
    InvalidExpire,

    /// The key holds a different variant
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),
}

impl From<StorageError> for CommandError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::WrongType => CommandError::WrongType,
            StorageError::NotAnInteger => CommandError::NotAnInteger,
        }
    }
}

impl From<ExpiryError> for CommandError {
    fn from(err: ExpiryError) -> Self {
        match err {
            ExpiryError::NotAnInteger => CommandError::NotAnInteger,
            ExpiryError::InvalidExpire => CommandError::InvalidExpire,
        }
    }
}

pub type CommandResult = Result<RespValue, CommandError>;

/// Routes commands to their handlers. Owns the store it operates on.
#[derive(Debug, Default)]
pub struct CommandHandler {
    storage: StorageEngine,
}

impl CommandHandler {
    pub fn new(storage: StorageEngine) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut StorageEngine {
        &mut self.storage
    }

    /// Executes one decoded command and returns its reply.
    ///
    /// `command[0]` is the name, matched case-insensitively. Failures come
    /// back as error replies; nothing here ends the connection.
    pub fn execute(&mut self, command: &[Bytes]) -> RespValue {
        let Some((name, args)) = command.split_first() else {
            return RespValue::error("ERR empty command");
        };

        trace!(command = %String::from_utf8_lossy(name), args = args.len(), "Executing command");

        match self.dispatch(name, args) {
            Ok(reply) => reply,
            Err(err) => {
                debug!(command = %String::from_utf8_lossy(name), error = %err, "Command failed");
                RespValue::error(err.to_string())
            }
        }
    }

    /// Dispatches a command to its handler.
    fn dispatch(&mut self, name: &[u8], args: &[Bytes]) -> CommandResult {
        match name.to_ascii_uppercase().as_slice() {
            // String commands
            b"SET" => self.cmd_set(args),
            b"GET" => self.cmd_get(args),
            b"INCR" => self.cmd_incr(args),
            b"MSET" => self.cmd_mset(args),

            // List commands
            b"LPUSH" => self.cmd_lpush(args),
            b"RPUSH" => self.cmd_rpush(args),
            b"LPOP" => self.cmd_lpop(args),
            b"RPOP" => self.cmd_rpop(args),
            b"LRANGE" => self.cmd_lrange(args),

            // Set and hash commands
            b"SADD" => self.cmd_sadd(args),
            b"SPOP" => self.cmd_spop(args),
            b"HSET" => self.cmd_hset(args),

            // Key commands
            b"DEL" => self.cmd_del(args),
            b"EXISTS" => self.cmd_exists(args),
            b"TYPE" => self.cmd_type(args),
            b"TTL" => self.cmd_ttl(args, false),
            b"PTTL" => self.cmd_ttl(args, true),

            // Server commands
            b"PING" => cmd_ping(args),
            b"ECHO" => cmd_echo(args),
            b"COMMAND" => Ok(RespValue::ok()),
            b"DBSIZE" => self.cmd_dbsize(args),
            b"FLUSHDB" | b"FLUSHALL" => self.cmd_flushdb(),

            _ => Err(CommandError::UnknownCommand(
                String::from_utf8_lossy(name).into_owned(),
            )),
        }
    }

    // ========================================================================
    // String Commands
    // ========================================================================

    /// SET key value [EX seconds | PX milliseconds] [NX | XX]
    fn cmd_set(&mut self, args: &[Bytes]) -> CommandResult {
        at_least(args, 2, "set")?;
        let options = parse_set_options(&args[2..])?;

        if self.storage.set(args[0].clone(), args[1].clone(), options) {
            Ok(RespValue::ok())
        } else {
            Ok(RespValue::null())
        }
    }

    /// GET key
    fn cmd_get(&mut self, args: &[Bytes]) -> CommandResult {
        exactly(args, 1, "get")?;
        Ok(RespValue::optional_bulk(self.storage.get(&args[0])?))
    }

    /// INCR key
    fn cmd_incr(&mut self, args: &[Bytes]) -> CommandResult {
        exactly(args, 1, "incr")?;
        Ok(RespValue::integer(self.storage.incr(args[0].clone())?))
    }

    /// MSET key value [key value ...]
    fn cmd_mset(&mut self, args: &[Bytes]) -> CommandResult {
        if args.is_empty() || args.len() % 2 != 0 {
            return Err(CommandError::WrongArity("mset"));
        }
        self.storage.mset(pairs(args));
        Ok(RespValue::ok())
    }

    // ========================================================================
    // List Commands
    // ========================================================================

    /// LPUSH key value [value ...]
    fn cmd_lpush(&mut self, args: &[Bytes]) -> CommandResult {
        at_least(args, 2, "lpush")?;
        let len = self.storage.lpush(args[0].clone(), args[1..].to_vec())?;
        Ok(RespValue::integer(len as i64))
    }

    /// RPUSH key value [value ...]
    fn cmd_rpush(&mut self, args: &[Bytes]) -> CommandResult {
        at_least(args, 2, "rpush")?;
        let len = self.storage.rpush(args[0].clone(), args[1..].to_vec())?;
        Ok(RespValue::integer(len as i64))
    }

    /// LPOP key
    fn cmd_lpop(&mut self, args: &[Bytes]) -> CommandResult {
        exactly(args, 1, "lpop")?;
        Ok(RespValue::optional_bulk(self.storage.lpop(&args[0])?))
    }

    /// RPOP key
    fn cmd_rpop(&mut self, args: &[Bytes]) -> CommandResult {
        exactly(args, 1, "rpop")?;
        Ok(RespValue::optional_bulk(self.storage.rpop(&args[0])?))
    }

    /// LRANGE key start stop
    fn cmd_lrange(&mut self, args: &[Bytes]) -> CommandResult {
        exactly(args, 3, "lrange")?;
        let start = parse_i64(&args[1]).ok_or(CommandError::NotAnInteger)?;
        let stop = parse_i64(&args[2]).ok_or(CommandError::NotAnInteger)?;

        match self.storage.lrange(&args[0], start, stop)? {
            Some(items) => Ok(RespValue::bulk_array(items)),
            None => Ok(RespValue::null()),
        }
    }

    // ========================================================================
    // Set and Hash Commands
    // ========================================================================

    /// SADD key member [member ...]
    fn cmd_sadd(&mut self, args: &[Bytes]) -> CommandResult {
        at_least(args, 2, "sadd")?;
        let added = self.storage.sadd(args[0].clone(), args[1..].to_vec())?;
        Ok(RespValue::integer(added as i64))
    }

    /// SPOP key
    fn cmd_spop(&mut self, args: &[Bytes]) -> CommandResult {
        exactly(args, 1, "spop")?;
        Ok(RespValue::optional_bulk(self.storage.spop(&args[0])?))
    }

    /// HSET key field value [field value ...]
    fn cmd_hset(&mut self, args: &[Bytes]) -> CommandResult {
        if args.len() < 3 || (args.len() - 1) % 2 != 0 {
            return Err(CommandError::WrongArity("hset"));
        }
        let created = self.storage.hset(args[0].clone(), pairs(&args[1..]))?;
        Ok(RespValue::integer(created as i64))
    }

    // ========================================================================
    // Key Commands
    // ========================================================================

    /// DEL key [key ...]
    fn cmd_del(&mut self, args: &[Bytes]) -> CommandResult {
        at_least(args, 1, "del")?;
        Ok(RespValue::integer(self.storage.delete(args) as i64))
    }

    /// EXISTS key [key ...]
    fn cmd_exists(&mut self, args: &[Bytes]) -> CommandResult {
        at_least(args, 1, "exists")?;
        Ok(RespValue::integer(self.storage.exists(args) as i64))
    }

    /// TYPE key
    fn cmd_type(&mut self, args: &[Bytes]) -> CommandResult {
        exactly(args, 1, "type")?;
        let name = self.storage.key_type(&args[0]).unwrap_or("none");
        Ok(RespValue::simple_string(name))
    }

    /// TTL key / PTTL key
    fn cmd_ttl(&mut self, args: &[Bytes], millis: bool) -> CommandResult {
        exactly(args, 1, if millis { "pttl" } else { "ttl" })?;
        let reply = match self.storage.ttl(&args[0]) {
            KeyTtl::Missing => -2,
            KeyTtl::Persistent => -1,
            KeyTtl::Expires(left) => {
                let ms = left.as_millis() as i64;
                if millis {
                    ms
                } else {
                    (ms + 500) / 1000
                }
            }
        };
        Ok(RespValue::integer(reply))
    }

    // ========================================================================
    // Server Commands
    // ========================================================================

    /// DBSIZE
    fn cmd_dbsize(&mut self, args: &[Bytes]) -> CommandResult {
        exactly(args, 0, "dbsize")?;
        Ok(RespValue::integer(self.storage.len() as i64))
    }

    /// FLUSHDB / FLUSHALL
    fn cmd_flushdb(&mut self) -> CommandResult {
        self.storage.flush();
        Ok(RespValue::ok())
    }
}

/// PING [message]
fn cmd_ping(args: &[Bytes]) -> CommandResult {
    match args {
        [] => Ok(RespValue::bulk_string("PONG")),
        [message] => Ok(RespValue::bulk_string(message.clone())),
        _ => Err(CommandError::WrongArity("ping")),
    }
}

/// ECHO message
fn cmd_echo(args: &[Bytes]) -> CommandResult {
    exactly(args, 1, "echo")?;
    Ok(RespValue::bulk_string(args[0].clone()))
}

/// Parses the options following `SET key value`.
///
/// Options are case-insensitive and may come in any order. Giving two TTLs,
/// two conditions, a TTL without its duration, or anything unrecognized is a
/// syntax error.
fn parse_set_options(args: &[Bytes]) -> Result<SetOptions, CommandError> {
    let mut options = SetOptions::default();
    let mut rest = args.iter();

    while let Some(raw) = rest.next() {
        let option = raw.to_ascii_uppercase();
        match option.as_slice() {
            b"NX" | b"XX" => {
                if options.condition.is_some() {
                    return Err(CommandError::Syntax);
                }
                options.condition = Some(if option == b"NX" {
                    SetCondition::Nx
                } else {
                    SetCondition::Xx
                });
            }
            b"EX" | b"PX" => {
                if options.expiry.is_some() {
                    return Err(CommandError::Syntax);
                }
                let amount = rest.next().ok_or(CommandError::Syntax)?;
                options.expiry = Some(Expiry::parse(amount, option == b"PX")?);
            }
            _ => return Err(CommandError::Syntax),
        }
    }

    Ok(options)
}

fn exactly(args: &[Bytes], n: usize, name: &'static str) -> Result<(), CommandError> {
    if args.len() == n {
        Ok(())
    } else {
        Err(CommandError::WrongArity(name))
    }
}

fn at_least(args: &[Bytes], n: usize, name: &'static str) -> Result<(), CommandError> {
    if args.len() >= n {
        Ok(())
    } else {
        Err(CommandError::WrongArity(name))
    }
}

/// Groups an even-length argument slice into pairs.
fn pairs(args: &[Bytes]) -> Vec<(Bytes, Bytes)> {
    args.chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}
