//! A toy widget set, just enough to have something to attribute.

use parking_lot::Mutex;
use std::sync::Arc;
use weft::{BroadcastError, ElementRef, VisualTreeElement};

pub struct Grid {
    children: Mutex<Vec<ElementRef>>,
}

impl Grid {
    pub fn new() -> Arc<Self> {
        let grid = Arc::new(Self {
            children: Mutex::new(Vec::new()),
        });
        weft::attribute_from_construction_context(&grid);
        grid
    }

    pub fn add_child(self: &Arc<Self>, child: ElementRef) -> Result<(), BroadcastError> {
        self.children.lock().push(Arc::clone(&child));
        let parent: ElementRef = self.clone();
        weft::notify_added(Some(&parent), &child, None)
    }

    pub fn remove_child(
        self: &Arc<Self>,
        index: usize,
    ) -> Result<Option<ElementRef>, BroadcastError> {
        let removed = {
            let mut children = self.children.lock();
            (index < children.len()).then(|| children.remove(index))
        };
        if let Some(child) = &removed {
            let parent: ElementRef = self.clone();
            weft::notify_removed(Some(&parent), child, index)?;
        }
        Ok(removed)
    }
}

impl VisualTreeElement for Grid {
    fn visual_children(&self) -> Vec<ElementRef> {
        self.children.lock().clone()
    }
}

pub struct Border {
    pub thickness: u32,
}

impl Border {
    pub fn new(thickness: u32) -> Arc<Self> {
        let border = Arc::new(Self { thickness });
        weft::attribute_from_construction_context(&border);
        border
    }
}

impl VisualTreeElement for Border {
    fn visual_children(&self) -> Vec<ElementRef> {
        Vec::new()
    }
}

pub struct Button {
    pub label: String,
    chrome: Arc<Border>,
}

impl Button {
    pub fn new(label: impl Into<String>) -> Arc<Self> {
        // The chrome is an implementation detail, not something the page author wrote.
        let chrome = weft::suppressed(|| Border::new(1));
        let button = Arc::new(Self {
            label: label.into(),
            chrome,
        });
        weft::attribute_from_construction_context(&button);
        button
    }

    pub fn chrome(&self) -> &Arc<Border> {
        &self.chrome
    }
}

impl VisualTreeElement for Button {
    fn visual_children(&self) -> Vec<ElementRef> {
        vec![self.chrome.clone()]
    }
}

/// Records its creation site through `#[track_caller]` instead of a stack walk.
pub struct Label {
    pub text: String,
}

impl Label {
    #[track_caller]
    pub fn new(text: impl Into<String>) -> Arc<Self> {
        let label = Arc::new(Self { text: text.into() });
        weft::register_caller(&label);
        label
    }
}

impl VisualTreeElement for Label {
    fn visual_children(&self) -> Vec<ElementRef> {
        Vec::new()
    }
}
