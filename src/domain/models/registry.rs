// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 同步模型注册表
//!
//! 模型名到结构、分页策略和子集合的显式映射，按同步顺序排列。

use once_cell::sync::Lazy;

use crate::domain::normalizer::shapes::{
    RecordShape, COMMENT, CONTACT, CUSTOMER, ESTIMATE, INVOICE, LINE_ITEM, PAYMENT, PRODUCT,
    TICKET, TICKET_TYPE, TICKET_TYPE_FIELD, TICKET_TYPE_FIELD_ANSWER, USER,
};
use crate::engines::traits::QueryParams;

/// 子集合来源
#[derive(Debug, Clone, Copy)]
pub enum ChildSource {
    /// 随父记录一起返回的嵌套列表
    Embedded { field: &'static str },
    /// 按父 id 单独查询
    ByParent {
        parent_key: &'static str,
        /// 是否在周期内整体预取
        prefetch: bool,
    },
}

/// 子集合声明
#[derive(Debug, Clone, Copy)]
pub struct RelatedCollection {
    /// 集合名，同时作为链接记录的 `collection`
    pub name: &'static str,
    pub shape: &'static RecordShape,
    pub source: ChildSource,
}

impl RelatedCollection {
    pub fn child_model(&self) -> &'static str {
        self.shape.name
    }
}

/// 模型描述
#[derive(Debug)]
pub struct ModelDescriptor {
    pub name: &'static str,
    pub shape: &'static RecordShape,
    /// 增量模式下只取最后 N 页
    pub num_last_pages: Option<u32>,
    /// 固定查询参数
    pub params: &'static [(&'static str, &'static str)],
    pub related: &'static [RelatedCollection],
}

impl ModelDescriptor {
    pub fn query_params(&self) -> QueryParams {
        self.params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// 对账族：按父 id 查询的子集合
#[derive(Debug, Clone, Copy)]
pub struct ParityFamily {
    pub parent_model: &'static str,
    pub collection: &'static RelatedCollection,
    pub parent_key: &'static str,
}

impl ParityFamily {
    pub fn child_model(&self) -> &'static str {
        self.collection.child_model()
    }

    /// 查询厂商聚合数量的参数
    pub fn aggregate_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.insert(format!("{}_not_null", self.parent_key), "true".to_string());
        params
    }
}

const SORT_UPDATED_ASC: &[(&str, &str)] = &[("sort", "updated_at ASC")];

static CUSTOMER_RELATED: [RelatedCollection; 1] = [RelatedCollection {
    name: "contacts",
    shape: &CONTACT,
    source: ChildSource::Embedded { field: "contacts" },
}];

static INVOICE_RELATED: [RelatedCollection; 1] = [RelatedCollection {
    name: "line_items",
    shape: &LINE_ITEM,
    source: ChildSource::ByParent {
        parent_key: "invoice_id",
        prefetch: true,
    },
}];

static TICKET_RELATED: [RelatedCollection; 1] = [RelatedCollection {
    name: "comments",
    shape: &COMMENT,
    source: ChildSource::Embedded { field: "comments" },
}];

/// 工单设置接口返回的集合，键名到记录结构
pub static TICKET_SETTINGS: [(&str, &RecordShape); 3] = [
    ("ticket_types", &TICKET_TYPE),
    ("ticket_type_fields", &TICKET_TYPE_FIELD),
    ("ticket_type_field_answers", &TICKET_TYPE_FIELD_ANSWER),
];

static REGISTRY: Lazy<Vec<ModelDescriptor>> = Lazy::new(|| {
    vec![
        ModelDescriptor {
            name: "customer",
            shape: &CUSTOMER,
            num_last_pages: Some(10),
            params: SORT_UPDATED_ASC,
            related: &CUSTOMER_RELATED,
        },
        ModelDescriptor {
            name: "estimate",
            shape: &ESTIMATE,
            num_last_pages: Some(1),
            params: &[],
            related: &[],
        },
        ModelDescriptor {
            name: "invoice",
            shape: &INVOICE,
            num_last_pages: None,
            params: &[],
            related: &INVOICE_RELATED,
        },
        ModelDescriptor {
            name: "payment",
            shape: &PAYMENT,
            num_last_pages: Some(2),
            params: &[],
            related: &[],
        },
        ModelDescriptor {
            name: "product",
            shape: &PRODUCT,
            num_last_pages: Some(2),
            params: SORT_UPDATED_ASC,
            related: &[],
        },
        ModelDescriptor {
            name: "ticket",
            shape: &TICKET,
            num_last_pages: None,
            params: &[],
            related: &TICKET_RELATED,
        },
        ModelDescriptor {
            name: "user",
            shape: &USER,
            num_last_pages: None,
            params: &[],
            related: &[],
        },
    ]
});

/// 全部模型，按同步顺序
pub fn registry() -> &'static [ModelDescriptor] {
    &REGISTRY
}

/// 按名称查找模型
pub fn find_model(name: &str) -> Option<&'static ModelDescriptor> {
    REGISTRY.iter().find(|m| m.name == name)
}

/// 按配置选出的模型，保持声明顺序
///
/// `None` 表示全部模型
pub fn selected_models(names: Option<&[String]>) -> Vec<&'static ModelDescriptor> {
    match names {
        None => REGISTRY.iter().collect(),
        Some(names) => REGISTRY
            .iter()
            .filter(|m| names.iter().any(|n| n == m.name))
            .collect(),
    }
}

/// 所选模型中需要对账的子集合
pub fn parity_families(models: &[&'static ModelDescriptor]) -> Vec<ParityFamily> {
    models
        .iter()
        .flat_map(|model| {
            model.related.iter().filter_map(move |collection| match collection.source {
                ChildSource::ByParent { parent_key, .. } => Some(ParityFamily {
                    parent_model: model.name,
                    collection,
                    parent_key,
                }),
                ChildSource::Embedded { .. } => None,
            })
        })
        .collect()
}
