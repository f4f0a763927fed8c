use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Built-in address space layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, EnumIter, Display)]
pub enum Layout {
    #[default]
    Default,
    CompactDataAtZero,
    CompactTextAtZero,
}

/// Every segment base and limit of the simulated address space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfiguration {
    pub name: String,
    pub text_base: u32,
    pub data_segment_base: u32,
    pub extern_base: u32,
    pub global_pointer: u32,
    pub data_base: u32,
    pub heap_base: u32,
    pub stack_pointer: u32,
    pub stack_base: u32,
    pub user_high: u32,
    pub kernel_base: u32,
    pub kernel_text_base: u32,
    pub exception_handler: u32,
    pub kernel_data_base: u32,
    pub mmio_base: u32,
    pub kernel_high: u32,
    pub data_segment_limit: u32,
    pub text_limit: u32,
    pub kernel_data_limit: u32,
    pub kernel_text_limit: u32,
    pub stack_limit: u32,
    pub mmio_limit: u32,
}

impl Default for MemoryConfiguration {
    fn default() -> Self {
        Self::layout(Layout::Default)
    }
}

impl MemoryConfiguration {
    pub fn layout(layout: Layout) -> Self {
        let name = layout.to_string();
        match layout {
            Layout::Default => Self {
                name,
                text_base: 0x0040_0000,
                data_segment_base: 0x1000_0000,
                extern_base: 0x1000_0000,
                global_pointer: 0x1000_8000,
                data_base: 0x1001_0000,
                heap_base: 0x1004_0000,
                stack_pointer: 0x7FFF_EFFC,
                stack_base: 0x7FFF_FFFC,
                user_high: 0x7FFF_FFFF,
                kernel_base: 0x8000_0000,
                kernel_text_base: 0x8000_0000,
                exception_handler: 0x8000_0180,
                kernel_data_base: 0x9000_0000,
                mmio_base: 0xFFFF_0000,
                kernel_high: 0xFFFF_FFFF,
                data_segment_limit: 0x7FFF_FFFF,
                text_limit: 0x0FFF_FFFC,
                kernel_data_limit: 0xFFFE_FFFF,
                kernel_text_limit: 0x8FFF_FFFC,
                stack_limit: 0x1004_0000,
                mmio_limit: 0xFFFF_FFFF,
            },
            Layout::CompactDataAtZero => Self {
                name,
                text_base: 0x0000_3000,
                data_segment_base: 0x0000_0000,
                extern_base: 0x0000_1000,
                global_pointer: 0x0000_1800,
                data_base: 0x0000_0000,
                heap_base: 0x0000_2000,
                stack_pointer: 0x0000_2FFC,
                stack_base: 0x0000_2FFC,
                user_high: 0x0000_3FFF,
                kernel_base: 0x0000_4000,
                kernel_text_base: 0x0000_4000,
                exception_handler: 0x0000_4180,
                kernel_data_base: 0x0000_5000,
                mmio_base: 0x0000_7F00,
                kernel_high: 0x0000_7FFF,
                data_segment_limit: 0x0000_2FFF,
                text_limit: 0x0000_3FFC,
                kernel_data_limit: 0x0000_7EFF,
                kernel_text_limit: 0x0000_4FFC,
                stack_limit: 0x0000_2000,
                mmio_limit: 0x0000_7FFF,
            },
            Layout::CompactTextAtZero => Self {
                name,
                text_base: 0x0000_0000,
                data_segment_base: 0x0000_1000,
                extern_base: 0x0000_1000,
                global_pointer: 0x0000_1800,
                data_base: 0x0000_2000,
                heap_base: 0x0000_3000,
                stack_pointer: 0x0000_3FFC,
                stack_base: 0x0000_3FFC,
                user_high: 0x0000_3FFF,
                kernel_base: 0x0000_4000,
                kernel_text_base: 0x0000_4000,
                exception_handler: 0x0000_4180,
                kernel_data_base: 0x0000_5000,
                mmio_base: 0x0000_7F00,
                kernel_high: 0x0000_7FFF,
                data_segment_limit: 0x0000_3FFF,
                text_limit: 0x0000_0FFC,
                kernel_data_limit: 0x0000_7EFF,
                kernel_text_limit: 0x0000_4FFC,
                stack_limit: 0x0000_3000,
                mmio_limit: 0x0000_7FFF,
            },
        }
    }

    /// True when every address fits in 15 bits, so a label address fits a
    /// sign-extended 16-bit immediate.
    pub fn is_compact(&self) -> bool {
        self.kernel_high & 0x0000_7FFF == self.kernel_high
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts() {
        assert!(!MemoryConfiguration::default().is_compact());
        assert!(MemoryConfiguration::layout(Layout::CompactDataAtZero).is_compact());
        assert_eq!("CompactTextAtZero".parse::<Layout>().ok(), Some(Layout::CompactTextAtZero));
    }
}
