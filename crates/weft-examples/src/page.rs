use std::sync::Arc;
use weft::{BroadcastError, SourceLocation};

use crate::ui::{Border, Button, Grid, Label};

pub struct MainPage {
    pub root: Arc<Grid>,
    pub title: Arc<Label>,
    pub ok: Arc<Button>,
    pub frame: Arc<Border>,
}

impl MainPage {
    pub fn build() -> Result<Self, BroadcastError> {
        let root = Grid::new();
        let title = Label::new("Welcome");
        let ok = Button::new("OK");
        let frame = Border::new(2);

        root.add_child(title.clone())?;
        root.add_child(ok.clone())?;
        root.add_child(frame.clone())?;

        Ok(Self {
            root,
            title,
            ok,
            frame,
        })
    }

    /// Drops the decorative frame again, which exercises the remove path.
    pub fn simplify(&self) -> Result<(), BroadcastError> {
        self.root.remove_child(2)?;
        Ok(())
    }

    pub fn source_report(&self) -> Vec<(String, Option<SourceLocation>)> {
        vec![
            ("Grid".to_string(), weft::get_source_info(&self.root)),
            (
                format!("Label {:?}", self.title.text),
                weft::get_source_info(&self.title),
            ),
            (
                format!("Button {:?}", self.ok.label),
                weft::get_source_info(&self.ok),
            ),
            (
                format!("Border({}) inside button", self.ok.chrome().thickness),
                weft::get_source_info(self.ok.chrome()),
            ),
            (
                format!("Border({})", self.frame.thickness),
                weft::get_source_info(&self.frame),
            ),
        ]
    }
}
