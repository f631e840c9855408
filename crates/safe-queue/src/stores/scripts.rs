//! Lua scripts run by the Redis store.
//!
//! Each script is one indivisible operation. Failures that must reach the
//! caller as a specific condition are returned as error replies whose first
//! word is one of the codes in [`crate::store::codes`].

use redis::Script;

pub(crate) const PUSH: &str = r"
local result = redis.call('RPUSH', KEYS[1], ARGV[1])

if tonumber(result) < 1 then
    return false
end

return 1
";

pub(crate) const POP: &str = r"
local result = redis.call('LPOP', KEYS[1])

if not result then
    return false
end

return result
";

/// KEYS: queue, pending set. ARGV: ttl in microseconds, highest sequence.
/// Replies `{ sequence, payload, now }`; `now` is the score just written.
pub(crate) const CHECKOUT: &str = r"
redis.replicate_commands()

local queue_key = KEYS[1]
local pending_key = KEYS[2]
local ttl = tonumber(ARGV[1])
local max_sequence = tonumber(ARGV[2])

local time = redis.call('TIME')
local now = tonumber(time[1]) * 1000000 + tonumber(time[2])

local function split(member)
    local at = string.find(member, '|', 1, true)
    if not at then
        return '', member
    end
    return string.sub(member, 1, at - 1), string.sub(member, at + 1)
end

local overdue = redis.call('ZRANGEBYSCORE', pending_key, '-inf', now - ttl, 'LIMIT', 0, 1)

if #overdue > 0 then
    local added = redis.call('ZADD', pending_key, now, overdue[1])
    if tonumber(added) ~= 0 then
        return redis.error_reply('TSUPDATE timestamp update failed')
    end

    local sequence, payload = split(overdue[1])
    return { sequence, payload, now }
end

local payload = redis.call('LPOP', queue_key)

if not payload then
    return false
end

if tonumber(redis.call('ZADD', pending_key, 'NX', now, '0|' .. payload)) == 1 then
    return { '0', payload, now }
end

local highest = -1
for _, member in ipairs(redis.call('ZRANGE', pending_key, 0, -1)) do
    local sequence, rest = split(member)
    local n = tonumber(sequence)
    if rest == payload and n and n > highest then
        highest = n
    end
end

local next_sequence = highest + 1
if highest >= 0 and next_sequence <= max_sequence then
    local sequence = string.format('%d', next_sequence)
    if tonumber(redis.call('ZADD', pending_key, 'NX', now, sequence .. '|' .. payload)) == 1 then
        return { sequence, payload, now }
    end
end

redis.call('LPUSH', queue_key, payload)

return redis.error_reply('CHECKOUTEOF EOF while checkout')
";

/// KEYS: pending set. ARGV: member, score it was delivered with.
pub(crate) const ACKNOWLEDGE: &str = r"
local score = redis.call('ZSCORE', KEYS[1], ARGV[1])

if not score or tonumber(score) ~= tonumber(ARGV[2]) then
    return false
end

redis.call('ZREM', KEYS[1], ARGV[1])

return 1
";

/// KEYS: queue and, optionally, pending set.
pub(crate) const STATS: &str = r"
local queued = redis.call('LLEN', KEYS[1])
local pending = 0

if #KEYS > 1 then
    pending = redis.call('ZCARD', KEYS[2])
end

return { queued, pending }
";

/// Scripts loaded by one store instance
pub(crate) struct Scripts {
    pub(crate) push: Script,
    pub(crate) pop: Script,
    pub(crate) checkout: Script,
    pub(crate) acknowledge: Script,
    pub(crate) stats: Script,
}

impl Scripts {
    pub(crate) fn new() -> Self {
        Self {
            push: Script::new(PUSH),
            pop: Script::new(POP),
            checkout: Script::new(CHECKOUT),
            acknowledge: Script::new(ACKNOWLEDGE),
            stats: Script::new(STATS),
        }
    }
}
