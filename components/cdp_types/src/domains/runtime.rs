// Runtime domain types shared by profiles

use serde::{Deserialize, Serialize};

/// Call frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    /// Function name
    pub function_name: String,
    /// Script ID
    pub script_id: String,
    /// Script URL
    pub url: String,
    /// Line number (0-based)
    pub line_number: u32,
    /// Column number (0-based)
    pub column_number: u32,
}

impl CallFrame {
    /// Frame for the synthetic root node of a profile tree
    pub fn root() -> Self {
        Self::new("(root)", "0", "", 0, 0)
    }

    /// Create a new call frame
    pub fn new(
        function_name: impl Into<String>,
        script_id: impl Into<String>,
        url: impl Into<String>,
        line_number: u32,
        column_number: u32,
    ) -> Self {
        Self {
            function_name: function_name.into(),
            script_id: script_id.into(),
            url: url.into(),
            line_number,
            column_number,
        }
    }
}
