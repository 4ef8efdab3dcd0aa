//! Server-side scripts for the ownership-checked primitives.
//!
//! `KEYS[1]` is the lease key, `ARGV[1]` the owner token, `ARGV[2]` the TTL
//! in milliseconds. Both scripts reply with an integer: 1 on effect, 0 when
//! the key is absent or owned by another token.

/// Reset the key's TTL only if it still holds the caller's token.
pub const COMPARE_AND_EXTEND: &str = r"
if redis.call('get', KEYS[1]) == ARGV[1] then
  return redis.call('pexpire', KEYS[1], ARGV[2])
else
  return 0
end";

/// Delete the key only if it still holds the caller's token.
pub const COMPARE_AND_DELETE: &str = r"
if redis.call('get', KEYS[1]) == ARGV[1] then
  return redis.call('del', KEYS[1])
else
  return 0
end";
