//! Virtual keys driven from the terminal
//!
//! Each line on stdin presses one key: `1`, `2` or `3` for a short press,
//! with an `l` suffix (`1l`) for a long press. The key reads low for long
//! enough that the button listener classifies the press the same way it
//! would a real one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use trail_mapper::config::ButtonConfig;
use trail_mapper::devices::buttons::{Press, KEY_COUNT};
use trail_mapper::platform::traits::InputPin;

/// Shared key states
#[derive(Debug, Clone, Default)]
pub struct VirtualKeys {
    pressed: Arc<[AtomicBool; KEY_COUNT]>,
}

/// One key as seen by the button listener
#[derive(Debug, Clone)]
pub struct VirtualKey {
    pressed: Arc<[AtomicBool; KEY_COUNT]>,
    index: usize,
}

impl InputPin for VirtualKey {
    fn is_low(&mut self) -> bool {
        self.pressed[self.index].load(Ordering::Acquire)
    }
}

impl VirtualKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pins(&self) -> [VirtualKey; KEY_COUNT] {
        core::array::from_fn(|index| VirtualKey {
            pressed: Arc::clone(&self.pressed),
            index,
        })
    }

    /// Hold `key` down for `duration`
    pub async fn press(&self, key: usize, duration: Duration) {
        let Some(state) = self.pressed.get(key) else {
            return;
        };
        state.store(true, Ordering::Release);
        tokio::time::sleep(duration).await;
        state.store(false, Ordering::Release);
    }
}

/// How long to hold a key for `press`
pub fn hold_time(press: Press, config: &ButtonConfig) -> Duration {
    let ms = match press {
        Press::Short => config.poll_interval_ms * 2,
        Press::Long => config.hold_ms + config.poll_interval_ms * 3,
    };
    Duration::from_millis(ms)
}

/// Parse one stdin line into a key press
pub fn parse_command(line: &str) -> Option<(usize, Press)> {
    let line = line.trim();
    let (digit, press) = match line.strip_suffix('l') {
        Some(digit) => (digit, Press::Long),
        None => (line, Press::Short),
    };
    let key: usize = digit.parse().ok()?;
    key.checked_sub(1)
        .filter(|index| *index < KEY_COUNT)
        .map(|index| (index, press))
}

/// Feed stdin lines to the virtual keys forever
pub async fn read_keys(keys: VirtualKeys, config: ButtonConfig) -> ! {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_command(&line) {
                Some((key, press)) => keys.press(key, hold_time(press, &config)).await,
                None if line.trim().is_empty() => {}
                None => println!("keys: 1, 2, 3 (short) or 1l, 2l, 3l (long)"),
            },
            Ok(None) | Err(_) => {
                trail_mapper::log_info!("stdin closed, virtual keys disabled");
                std::future::pending::<()>().await;
            }
        }
    }
}
