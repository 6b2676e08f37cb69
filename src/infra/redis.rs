//! Redis implementation of the engagement cache backend.

use async_trait::async_trait;
use redis::{AsyncCommands, Client, RedisError, Script, aio::ConnectionManager};
use tracing::info;

use crate::cache::{CacheError, FieldRef, KvBackend, ToggleReply};

const NAME: &str = "redis";

/// Flips one user flag and moves the aggregate in a single server-side step.
///
/// Fields are read the way `parse_flag` and `parse_count` read them: values
/// are trimmed, and only plain decimal digits count as an aggregate. Anything
/// else (negative, hex, exponent, fraction) is treated as cold, zero before the
/// flip. The aggregate never drops below zero.
const TOGGLE_SCRIPT: &str = r#"
local key = KEYS[1]
local user = ARGV[1]
local aggregate = ARGV[2]

local function trim(value)
  return string.match(value, '^%s*(.-)%s*$')
end

local flag = redis.call('HGET', key, user)
local liked = false
if flag then
  local lowered = string.lower(trim(flag))
  liked = lowered == '1' or lowered == 't' or lowered == 'true'
end

local count = 0
local raw = redis.call('HGET', key, aggregate)
if raw then
  local digits = trim(raw)
  if string.match(digits, '^%+?%d+$') and #digits <= 18 then
    count = tonumber(digits)
  end
end

if liked then
  redis.call('HDEL', key, user)
  count = count - 1
  if count < 0 then
    count = 0
  end
else
  redis.call('HSET', key, user, '1')
  count = count + 1
end

redis.call('HSET', key, aggregate, tostring(count))
if liked then
  return {0, count}
end
return {1, count}
"#;

pub struct RedisBackend {
    connection: ConnectionManager,
    toggle: Script,
}

impl RedisBackend {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(|err| map_redis_error("open", err))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|err| map_redis_error("connect", err))?;
        info!(backend = NAME, "connected to cache backend");
        Ok(Self {
            connection,
            toggle: Script::new(TOGGLE_SCRIPT),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

fn map_redis_error(op: &'static str, err: RedisError) -> CacheError {
    if err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
    {
        CacheError::unavailable(NAME, format!("{op}: {err}"))
    } else {
        CacheError::rejected(NAME, op, err.to_string())
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn();
        let _pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|err| map_redis_error("ping", err))?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn();
        conn.hget(key, field)
            .await
            .map_err(|err| map_redis_error("hget", err))
    }

    async fn hget_many(&self, fields: &[FieldRef<'_>]) -> Result<Vec<Option<String>>, CacheError> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = redis::pipe();
        for field in fields {
            pipe.hget(field.key, field.field);
        }
        let mut conn = self.conn();
        let values: Vec<Option<String>> = pipe
            .query_async(&mut conn)
            .await
            .map_err(|err| map_redis_error("hget_many", err))?;
        Ok(values)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.conn();
        let _: () = conn
            .hset(key, field, value)
            .await
            .map_err(|err| map_redis_error("hset", err))?;
        Ok(())
    }

    async fn hset_nx(&self, key: &str, field: &str, value: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn();
        conn.hset_nx(key, field, value)
            .await
            .map_err(|err| map_redis_error("hset_nx", err))
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<(), CacheError> {
        let mut conn = self.conn();
        let _: () = conn
            .hdel(key, field)
            .await
            .map_err(|err| map_redis_error("hdel", err))?;
        Ok(())
    }

    async fn hincr(&self, key: &str, field: &str, delta: i64) -> Result<i64, CacheError> {
        let mut conn = self.conn();
        conn.hincr(key, field, delta)
            .await
            .map_err(|err| map_redis_error("hincr", err))
    }

    async fn toggle_flag(
        &self,
        key: &str,
        user_field: &str,
        aggregate_field: &str,
    ) -> Result<Option<ToggleReply>, CacheError> {
        let mut conn = self.conn();
        let (liked, count): (i64, i64) = self
            .toggle
            .key(key)
            .arg(user_field)
            .arg(aggregate_field)
            .invoke_async(&mut conn)
            .await
            .map_err(|err| map_redis_error("toggle_flag", err))?;
        Ok(Some(ToggleReply {
            liked: liked == 1,
            count: count.max(0) as u64,
        }))
    }
}
