/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A single idle/touch/display-power debounce timer, backed by its own
//! thread. `reset()` can be called from any thread at any rate; the
//! timer thread only ever wakes the caller-supplied callback once the
//! configured timeout elapses with no further reset in between.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, Sender};

enum Command {
    Reset,
    Stop,
}

/// A debounce timer: each [`DebounceTimer::reset`] call restarts the
/// countdown; the callback fires only once the countdown completes
/// uninterrupted.
pub struct DebounceTimer {
    commands: Sender<Command>,
    join_handle: Option<JoinHandle<()>>,
}

impl DebounceTimer {
    pub fn new<F>(timeout: Duration, on_expire: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let (commands_tx, commands_rx) = bounded::<Command>(16);
        let on_expire = Arc::new(on_expire);
        let join_handle = std::thread::Builder::new()
            .name("debounce-timer".into())
            .spawn(move || Self::run(commands_rx, timeout, on_expire))
            .expect("failed to spawn debounce timer thread");

        DebounceTimer { commands: commands_tx, join_handle: Some(join_handle) }
    }

    fn run<F: Fn() + Send + 'static>(commands: Receiver<Command>, timeout: Duration, on_expire: Arc<F>) {
        loop {
            // Block indefinitely until the first reset; an idle timer
            // with nothing to debounce yet shouldn't spin.
            match commands.recv() {
                Ok(Command::Reset) => {},
                Ok(Command::Stop) | Err(_) => return,
            }

            loop {
                let deadline = crossbeam_channel::after(timeout);
                select! {
                    recv(commands) -> msg => match msg {
                        Ok(Command::Reset) => continue,
                        Ok(Command::Stop) | Err(_) => return,
                    },
                    recv(deadline) -> _ => {
                        on_expire();
                        break;
                    },
                }
            }
        }
    }

    pub fn reset(&self) {
        // A full channel means a reset is already pending delivery;
        // dropping this one changes nothing observable.
        let _ = self.commands.try_send(Command::Reset);
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Stop);
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[test]
    fn fires_once_after_timeout_with_no_further_resets() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let timer = DebounceTimer::new(Duration::from_millis(20), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        timer.reset();
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn repeated_resets_before_timeout_suppress_firing() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let timer = DebounceTimer::new(Duration::from_millis(40), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        for _ in 0..5 {
            timer.reset();
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_the_timer_joins_its_thread_without_firing_again() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let timer = DebounceTimer::new(Duration::from_millis(20), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        timer.reset();
        std::thread::sleep(Duration::from_millis(50));
        drop(timer);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
