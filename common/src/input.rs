/// Debounce layer for the rotary encoder and its momentary push button.
/// Pure state; the platform layer samples the hardware and feeds raw values
/// in once per tick.
#[derive(Debug, Default)]
pub struct InputController {
    last_position: Option<i32>,
    button_was_pressed: bool,
}

impl InputController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signed distance travelled since the previous poll. The first poll
    /// establishes the baseline and reports no movement.
    pub fn poll_encoder(&mut self, current_position: i32) -> i32 {
        let delta = match self.last_position {
            Some(previous) => current_position - previous,
            None => 0,
        };
        self.last_position = Some(current_position);
        delta
    }

    /// True exactly once per press, on the release edge. Consecutive
    /// identical samples never fire, so a held button stays silent.
    pub fn poll_button_toggle(&mut self, pressed: bool) -> bool {
        let released = self.button_was_pressed && !pressed;
        self.button_was_pressed = pressed;
        released
    }
}
