use crate::client::ConnectionState;
use crate::feed::FeedState;
use crate::views::DashboardView;
use std::io::{self, Write};

/// Everything a renderer needs for one redraw.
pub struct RenderFrame<'a> {
    pub connection: ConnectionState,
    pub view: &'a DashboardView,
    pub feed: &'a FeedState,
}

pub trait Render {
    /// Redraw after a non-empty batch.
    fn render(&mut self, frame: &RenderFrame<'_>) -> io::Result<()>;

    /// Update the connection indicator.
    fn connection_changed(&mut self, state: ConnectionState) -> io::Result<()>;
}

/// Plain-text dashboard written to any [`Write`] sink.
pub struct TextRenderer<W: Write> {
    out: W,
    feed_only: bool,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            feed_only: false,
        }
    }

    /// Draw only the scrolling feed.
    pub fn feed_only(mut self, feed_only: bool) -> Self {
        self.feed_only = feed_only;
        self
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_dashboard(&mut self, frame: &RenderFrame<'_>) -> io::Result<()> {
        let view = frame.view;
        writeln!(
            self.out,
            "== ambulances: {}  traffic lights: {}  [{}] ==",
            view.vehicle_count,
            view.checkpoint_count,
            frame.connection.label()
        )?;

        let lights: Vec<String> = view
            .checkpoints
            .iter()
            .map(|t| format!("S{}:{}", t.checkpoint_id, t.signal.as_str()))
            .collect();
        writeln!(self.out, "lights:     {}", lights.join(" "))?;
        writeln!(self.out, "ambulances: {}", view.vehicles.join(" "))?;

        writeln!(self.out, "{:<8} {:<12} {:<8} {}", "ID", "AMBULANCE", "LIGHT", "TIME")?;
        for row in &view.rows {
            writeln!(
                self.out,
                "{:<8} {:<12} {:<8} {}",
                row.id,
                row.entity_id,
                row.checkpoint_id,
                row.occurred_at.format("%Y-%m-%d %H:%M:%S")
            )?;
        }
        Ok(())
    }

    fn write_feed(&mut self, feed: &FeedState) -> io::Result<()> {
        writeln!(self.out, "-- latest {} --", feed.len())?;
        for e in feed.entries() {
            writeln!(
                self.out,
                "{} passed light {} at {}",
                e.entity_id,
                e.checkpoint_id,
                e.occurred_at.format("%H:%M:%S")
            )?;
        }
        Ok(())
    }
}

impl<W: Write> Render for TextRenderer<W> {
    fn render(&mut self, frame: &RenderFrame<'_>) -> io::Result<()> {
        if !self.feed_only {
            self.write_dashboard(frame)?;
        }
        self.write_feed(frame.feed)?;
        self.out.flush()
    }

    fn connection_changed(&mut self, state: ConnectionState) -> io::Result<()> {
        writeln!(self.out, "[{}]", state.label())?;
        self.out.flush()
    }
}
