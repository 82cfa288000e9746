use std::{cell::RefCell, ffi::OsStr, str::FromStr};

const DEFAULT_MEMORY_SIZE: usize = 32;
const DEFAULT_MAX_STEPS: usize = 10_000;

#[derive(Clone, Copy)]
struct Env {
    trace_enabled: bool,
    memory_size: usize,
    max_steps: usize,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

pub fn init() {
    let value = Env {
        trace_enabled: var_is("LUNA_TRACE", "1"),
        memory_size: var_or("LUNA_MEMORY", DEFAULT_MEMORY_SIZE),
        max_steps: var_or("LUNA_MAX_STEPS", DEFAULT_MAX_STEPS),
    };
    set_env(value);
}

pub fn is_trace_enabled() -> bool {
    with_env(|env| env.trace_enabled)
}

/// Cells of memory when not given on the command line.
pub fn memory_size() -> usize {
    with_env(|env| env.memory_size)
}

/// Step limit when not given on the command line.
pub fn max_steps() -> usize {
    with_env(|env| env.max_steps)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}

fn var_or<T: FromStr>(name: impl AsRef<OsStr>, default: T) -> T {
    parse_or(std::env::var(name.as_ref()).ok().as_deref(), default)
}

/// Unset or malformed values fall back to the default.
fn parse_or<T: FromStr>(value: Option<&str>, default: T) -> T {
    value
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback() {
        assert_eq!(parse_or(None, 32usize), 32);
        assert_eq!(parse_or(Some("64"), 32usize), 64);
        assert_eq!(parse_or(Some(" 8 "), 32usize), 8);
        assert_eq!(parse_or(Some("-1"), 32usize), 32);
        assert_eq!(parse_or(Some("lots"), 32usize), 32);
    }

    #[test]
    fn init_once_per_thread() {
        assert!(std::panic::catch_unwind(is_trace_enabled).is_err());
        init();
        assert!(std::panic::catch_unwind(init).is_err());
    }
}
