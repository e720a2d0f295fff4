use std::sync::LazyLock;

use redis::Script;

/// Removes `ARGV[1]` from `KEYS[1]` and pushes it onto `KEYS[2]` only if it was there.
///
/// Returns 0 when nothing was removed, otherwise the new length of `KEYS[2]`.
pub static SAFE_PULL_PIPE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
local removed = redis.call("LREM", KEYS[1], -1, ARGV[1])
if removed > 0 then
  return redis.call("LPUSH", KEYS[2], ARGV[1])
end
return 0
"#,
    )
});
