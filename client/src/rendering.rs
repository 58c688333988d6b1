use macroquad::prelude::*;
use shared::constants::{
    BALL_RADIUS, FIELD_HEIGHT, FIELD_WIDTH, GOAL_WIDTH, GOAL_Y, GROUND_Y, PLAYER_BODY_H,
    PLAYER_BODY_W, PLAYER_KICK_RADIUS, PLAYER_RADIUS,
};
use shared::physics::{Ball, Player};
use shared::GameState;

const PLAYER_COLORS: [Color; 2] = [
    Color::new(0.2, 0.6, 1.0, 1.0),
    Color::new(1.0, 0.35, 0.3, 1.0),
];

/// Text overlays for one frame.
#[derive(Debug, Clone, Default)]
pub struct Hud {
    pub room_code: Option<String>,
    pub players: Vec<String>,
    pub my_index: usize,
    pub status: String,
    pub countdown: Option<u32>,
    pub banner: Option<String>,
    pub result: Option<String>,
    /// Whether a match (running, paused or finished) is on screen.
    pub playing: bool,
    pub fake_ping_ms: u64,
}

/// Maps field coordinates onto the window, keeping the aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldTransform {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl FieldTransform {
    pub fn fit(screen_w: f32, screen_h: f32) -> Self {
        let scale = (screen_w / FIELD_WIDTH).min(screen_h / FIELD_HEIGHT);
        Self {
            scale,
            offset_x: (screen_w - FIELD_WIDTH * scale) / 2.0,
            offset_y: (screen_h - FIELD_HEIGHT * scale) / 2.0,
        }
    }

    pub fn point(&self, x: f32, y: f32) -> (f32, f32) {
        (self.offset_x + x * self.scale, self.offset_y + y * self.scale)
    }

    pub fn len(&self, v: f32) -> f32 {
        v * self.scale
    }
}

pub struct Renderer {
    view: FieldTransform,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            view: FieldTransform::fit(FIELD_WIDTH, FIELD_HEIGHT),
        }
    }

    pub fn render(&mut self, state: &GameState, hud: &Hud) {
        self.view = FieldTransform::fit(screen_width(), screen_height());
        clear_background(Color::from_rgba(26, 26, 26, 255));

        self.draw_field();
        self.draw_goals();

        if hud.playing {
            for (index, player) in state.players.iter().enumerate() {
                self.draw_player(player, PLAYER_COLORS[index], index == hud.my_index);
            }
            self.draw_ball(&state.ball);
        }

        self.draw_ui(state, hud);
    }

    fn rect(&self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        let (sx, sy) = self.view.point(x, y);
        draw_rectangle(sx, sy, self.view.len(w), self.view.len(h), color);
    }

    fn draw_field(&self) {
        self.rect(0.0, 0.0, FIELD_WIDTH, GROUND_Y, Color::from_rgba(40, 110, 60, 255));
        self.rect(
            0.0,
            GROUND_Y,
            FIELD_WIDTH,
            FIELD_HEIGHT - GROUND_Y,
            Color::from_rgba(68, 68, 68, 255),
        );

        let (cx, top) = self.view.point(FIELD_WIDTH / 2.0, 0.0);
        let (_, bottom) = self.view.point(FIELD_WIDTH / 2.0, GROUND_Y);
        draw_line(cx, top, cx, bottom, 1.0, Color::from_rgba(255, 255, 255, 60));
    }

    fn draw_goals(&self) {
        let net = Color::from_rgba(220, 220, 220, 70);
        let height = GROUND_Y - GOAL_Y;
        self.rect(0.0, GOAL_Y, GOAL_WIDTH, height, net);
        self.rect(FIELD_WIDTH - GOAL_WIDTH, GOAL_Y, GOAL_WIDTH, height, net);

        // Crossbars
        self.rect(0.0, GOAL_Y - 3.0, GOAL_WIDTH, 6.0, WHITE);
        self.rect(FIELD_WIDTH - GOAL_WIDTH, GOAL_Y - 3.0, GOAL_WIDTH, 6.0, WHITE);
    }

    fn draw_player(&self, player: &Player, color: Color, is_local: bool) {
        let (left, top, _, _) = player.body_bounds();
        self.rect(left, top, PLAYER_BODY_W, PLAYER_BODY_H, color);

        let (hx, hy) = player.head_center();
        let (sx, sy) = self.view.point(hx, hy);
        let radius = self.view.len(PLAYER_RADIUS);
        draw_circle(sx, sy, radius, color);
        let outline = if is_local { YELLOW } else { WHITE };
        draw_circle_lines(sx, sy, radius, 2.0, outline);

        // Eye on the facing side
        let eye_x = sx + self.view.len(player.facing_f32() * PLAYER_RADIUS * 0.45);
        draw_circle(eye_x, sy - self.view.len(4.0), self.view.len(4.0), WHITE);

        if player.is_kicking {
            let (kx, ky) = player.kick_center();
            let (kx, ky) = self.view.point(kx, ky);
            draw_circle(kx, ky, self.view.len(PLAYER_KICK_RADIUS * 0.6), color);
        }
    }

    fn draw_ball(&self, ball: &Ball) {
        let (sx, sy) = self.view.point(ball.x, ball.y);
        let radius = self.view.len(BALL_RADIUS);
        draw_circle(sx, sy, radius, WHITE);
        draw_circle_lines(sx, sy, radius, 1.5, BLACK);
    }

    fn draw_centered(&self, text: &str, y: f32, size: u16, color: Color) {
        let dims = measure_text(text, None, size, 1.0);
        let x = (screen_width() - dims.width) / 2.0;
        draw_text(text, x, y, f32::from(size), color);
    }

    fn draw_ui(&self, state: &GameState, hud: &Hud) {
        if let Some(code) = &hud.room_code {
            draw_text(&format!("Room {}", code), 10.0, 20.0, 20.0, WHITE);
        }
        if hud.fake_ping_ms > 0 {
            draw_text(
                &format!("+{}ms", hud.fake_ping_ms),
                10.0,
                40.0,
                16.0,
                GRAY,
            );
        }

        if hud.playing {
            let name = |i: usize| hud.players.get(i).map(String::as_str).unwrap_or("-");
            let score = format!(
                "{} {} - {} {}",
                name(0),
                state.score[0],
                state.score[1],
                name(1)
            );
            self.draw_centered(&score, 30.0, 28, WHITE);
            let seconds = state.time_left.ceil().max(0.0) as u32;
            self.draw_centered(&format!("{}", seconds), 56.0, 22, LIGHTGRAY);
        }

        let middle = screen_height() / 2.0;
        if let Some(count) = hud.countdown {
            self.draw_centered(&count.to_string(), middle, 96, YELLOW);
        }
        if let Some(banner) = &hud.banner {
            self.draw_centered(banner, middle - 40.0, 48, YELLOW);
        }
        if let Some(result) = &hud.result {
            self.draw_centered(result, middle - 20.0, 56, WHITE);
        }
        if !hud.status.is_empty() {
            self.draw_centered(&hud.status, screen_height() - 16.0, 20, WHITE);
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
