//! 目录查询过滤器
//!
//! 所有条件可选，按 AND 组合。空字符串等同于未设置。

use serde::{Deserialize, Serialize};

/// `Catalog::find` / `Catalog::find_total` 的过滤条件
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectFilters {
    /// 对象类型（精确匹配）
    pub object_type: Option<String>,
    /// 备用标识符前缀（匹配逗号拼接后的存储字符串）
    pub alt_identifier: Option<String>,
    /// 所属集合的任一备用标识符（精确匹配）
    pub collection_alt_identifier: Option<String>,
}

impl ObjectFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }

    pub fn alt_identifier(mut self, prefix: impl Into<String>) -> Self {
        self.alt_identifier = Some(prefix.into());
        self
    }

    pub fn collection_alt_identifier(mut self, alternate_identifier: impl Into<String>) -> Self {
        self.collection_alt_identifier = Some(alternate_identifier.into());
        self
    }

    pub fn object_type_value(&self) -> Option<&str> {
        non_empty(&self.object_type)
    }

    pub fn alt_identifier_value(&self) -> Option<&str> {
        non_empty(&self.alt_identifier)
    }

    pub fn collection_alt_identifier_value(&self) -> Option<&str> {
        non_empty(&self.collection_alt_identifier)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
