//! Reading position handed to the persistence collaborator.

use serde::{Deserialize, Serialize};

/// Where the reader left a page, in visible-list coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadingPosition {
    pub document_id: u64,
    pub visible_row: usize,
    /// Pixel offset of `visible_row` from the top of the viewport
    pub pixel_offset: i32,
    /// Orientation the offset was measured in
    pub landscape: bool,
}

impl ReadingPosition {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_field_names() {
        let position = ReadingPosition {
            document_id: 7,
            visible_row: 12,
            pixel_offset: -40,
            landscape: true,
        };
        let json = position.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"document_id":7,"visible_row":12,"pixel_offset":-40,"landscape":true}"#
        );
        assert_eq!(ReadingPosition::from_json(&json).unwrap(), position);
    }
}
