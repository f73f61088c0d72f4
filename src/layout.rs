// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Canvas layout of an archive: positioned items that refer to the text and
//! image entries stored alongside it.

use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Text,
    Image,
    Shape,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Item {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub position: Position,
    pub size: Size,
    /// Name of the text entry shown by this item, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Item {
    pub fn new(kind: ItemKind, position: Position, size: Size) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            position,
            size,
            text: None,
        }
    }

    #[must_use]
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = Some(text.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Layout {
    #[serde(default)]
    items: Vec<Item>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a layout, treating a missing file as an empty canvas.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(Error::Layout),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Adds `item`, returning its identifier.
    pub fn add(&mut self, item: Item) -> Uuid {
        let id = item.id;
        self.items.push(item);
        id
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Item> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn get(&self, id: Uuid) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Items that display the given text entry.
    pub fn referencing<'layout>(
        &'layout self,
        text: &'layout str,
    ) -> impl Iterator<Item = &'layout Item> {
        self.items
            .iter()
            .filter(move |item| item.text.as_deref() == Some(text))
    }
}

#[cfg(test)]
mod tests {
    use uuid::uuid;

    use super::*;

    #[test]
    fn items_can_be_added_and_removed() {
        let mut layout = Layout::new();
        let a = layout.add(
            Item::new(ItemKind::Text, Position { x: 10, y: -4 }, Size { width: 200, height: 80 })
                .with_text("intro.txt"),
        );
        let b = layout.add(Item::new(ItemKind::Shape, Position::default(), Size::default()));

        assert_eq!(layout.items().len(), 2);
        assert_eq!(layout.get(a).map(|item| item.position.y), Some(-4));
        assert_eq!(layout.referencing("intro.txt").count(), 1);

        assert_eq!(layout.remove(b).map(|item| item.kind), Some(ItemKind::Shape));
        assert!(layout.remove(b).is_none());
        assert_eq!(layout.items().len(), 1);
    }

    #[test]
    fn document_shape() -> Result<()> {
        let mut layout = Layout::new();
        let _ = layout.add(Item {
            id: uuid!("46640aca-1245-44d2-8ca9-d19750597d6c"),
            kind: ItemKind::Image,
            position: Position { x: 1, y: 2 },
            size: Size { width: 3, height: 4 },
            text: None,
        });

        let value = serde_json::to_value(&layout)?;
        assert_eq!(
            value,
            serde_json::json!({
                "items": [{
                    "id": "46640aca-1245-44d2-8ca9-d19750597d6c",
                    "type": "image",
                    "position": { "x": 1, "y": 2 },
                    "size": { "width": 3, "height": 4 }
                }]
            })
        );
        Ok(())
    }

    #[test]
    fn missing_file_is_empty_and_garbage_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("content.scstate");
        assert_eq!(Layout::load(&path)?, Layout::default());

        fs::write(&path, "<items/>")?;
        let err = Layout::load(&path);
        assert!(matches!(err, Err(Error::Layout(_))));
        assert!(err.is_err_and(|e| e.code() == crate::error::code::LAYOUT_PARSE));
        Ok(())
    }

    #[test]
    fn saved_layout_loads_back() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("content.scstate");
        let mut layout = Layout::new();
        let _ = layout.add(
            Item::new(ItemKind::Text, Position { x: 5, y: 5 }, Size { width: 1, height: 1 })
                .with_text("a.txt"),
        );
        layout.save(&path)?;
        assert_eq!(Layout::load(&path)?, layout);
        Ok(())
    }
}
