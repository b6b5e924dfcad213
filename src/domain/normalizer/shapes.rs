// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 静态声明的记录结构
//!
//! 每种记录类型在编译期给出字段表，嵌套深度由声明决定。

/// 字段类型
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Integer,
    Float,
    Bool,
    Text,
    DateTime,
    /// 保持原始 JSON
    Json,
    /// 嵌套对象
    Nested(&'static RecordShape),
    /// 嵌套对象列表
    NestedList(&'static RecordShape),
}

/// 字段声明
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// 不可空字段缺失时填入类型默认值
    pub nullable: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
        }
    }

    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }
}

/// 记录结构
#[derive(Debug)]
pub struct RecordShape {
    /// 模型名
    pub name: &'static str,
    /// 字段表，不含 `id`
    pub fields: &'static [FieldSpec],
    /// 数组形式的行按顺序对应的字段名
    pub positional: &'static [&'static str],
}

impl RecordShape {
    /// 查找字段声明
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

use FieldKind::*;

const fn f(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec::new(name, kind)
}

const fn r(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec::required(name, kind)
}

pub static CUSTOMER_PROPERTIES: RecordShape = RecordShape {
    name: "customer_properties",
    fields: &[
        f("title", Text),
        f("notification_billing", Text),
        f("notification_reports", Text),
        f("notification_marketing", Text),
    ],
    positional: &[],
};

pub static CONTACT: RecordShape = RecordShape {
    name: "contact",
    fields: &[
        f("customer_id", Integer),
        f("name", Text),
        f("email", Text),
        f("phone", Text),
        f("mobile", Text),
        f("address1", Text),
        f("address2", Text),
        f("city", Text),
        f("state", Text),
        f("zip", Text),
        f("notes", Text),
        f("created_at", DateTime),
        f("updated_at", DateTime),
    ],
    positional: &[],
};

pub static CUSTOMER: RecordShape = RecordShape {
    name: "customer",
    fields: &[
        f("firstname", Text),
        f("lastname", Text),
        f("fullname", Text),
        f("business_name", Text),
        f("business_then_name", Text),
        f("email", Text),
        f("phone", Text),
        f("mobile", Text),
        f("address", Text),
        f("address_2", Text),
        f("city", Text),
        f("state", Text),
        f("zip", Text),
        f("latitude", Float),
        f("longitude", Float),
        f("notes", Text),
        f("get_sms", Bool),
        f("opt_out", Bool),
        f("disabled", Bool),
        f("no_email", Bool),
        f("location_id", Integer),
        f("location_name", Text),
        f("referred_by", Text),
        f("tax_rate_id", Integer),
        f("invoice_term_id", Integer),
        f("created_at", DateTime),
        f("updated_at", DateTime),
        f("properties", Nested(&CUSTOMER_PROPERTIES)),
        f("contacts", NestedList(&CONTACT)),
    ],
    positional: &[],
};

pub static ESTIMATE: RecordShape = RecordShape {
    name: "estimate",
    fields: &[
        f("customer_id", Integer),
        f("customer_business_then_name", Text),
        f("number", Text),
        f("status", Text),
        f("date", DateTime),
        f("subtotal", Float),
        f("total", Float),
        f("tax", Float),
        f("ticket_id", Integer),
        f("invoice_id", Integer),
        f("location_id", Integer),
        f("employee", Text),
        f("pdf_url", Text),
        f("created_at", DateTime),
        f("updated_at", DateTime),
    ],
    positional: &[],
};

pub static LINE_ITEM: RecordShape = RecordShape {
    name: "line_item",
    fields: &[
        f("invoice_id", Integer),
        f("item", Text),
        f("name", Text),
        f("cost", Float),
        f("price", Float),
        f("quantity", Float),
        f("product_id", Integer),
        f("product_category", Text),
        f("taxable", Bool),
        f("discount_percent", Float),
        f("discount_dollars", Float),
        f("position", Integer),
        f("invoice_bundle_id", Integer),
        f("created_at", DateTime),
        f("updated_at", DateTime),
    ],
    positional: &[],
};

pub static INVOICE: RecordShape = RecordShape {
    name: "invoice",
    fields: &[
        f("customer_id", Integer),
        f("customer_business_then_name", Text),
        f("number", Text),
        f("date", DateTime),
        f("due_date", DateTime),
        f("subtotal", Float),
        f("total", Float),
        f("tax", Float),
        f("hardwarecost", Float),
        f("verified_paid", Bool),
        f("tech_marked_paid", Bool),
        f("is_paid", Bool),
        f("ticket_id", Integer),
        f("user_id", Integer),
        f("contact_id", Integer),
        f("location_id", Integer),
        f("po_number", Text),
        f("note", Text),
        f("pdf_url", Text),
        f("created_at", DateTime),
        f("updated_at", DateTime),
    ],
    positional: &[],
};

pub static PAYMENT: RecordShape = RecordShape {
    name: "payment",
    fields: &[
        f("customer_id", Integer),
        f("success", Bool),
        f("payment_amount", Float),
        f("invoice_ids", Json),
        f("ref_num", Text),
        f("payment_method", Text),
        f("applied_at", DateTime),
        f("signature_date", DateTime),
        f("transaction_response", Json),
        f("created_at", DateTime),
        f("updated_at", DateTime),
    ],
    positional: &[],
};

pub static PRODUCT: RecordShape = RecordShape {
    name: "product",
    fields: &[
        r("price_cost", Float),
        r("price_retail", Float),
        r("price_wholesale", Float),
        r("condition", Text),
        r("description", Text),
        r("long_description", Text),
        r("maintain_stock", Bool),
        r("name", Text),
        r("quantity", Integer),
        r("warranty", Text),
        r("sort_order", Text),
        r("reorder_at", Text),
        r("disabled", Bool),
        r("taxable", Bool),
        r("serialized", Bool),
        r("product_category", Text),
        r("category_path", Text),
        r("upc_code", Text),
        r("discount_percent", Text),
        r("notes", Text),
        r("physical_location", Text),
        f("vendor_ids", Json),
        f("location_quantities", Json),
        f("photos", Json),
        f("created_at", DateTime),
        f("updated_at", DateTime),
    ],
    positional: &[],
};

pub static TICKET_PROPERTIES: RecordShape = RecordShape {
    name: "ticket_properties",
    fields: &[
        f("day", Text),
        f("case", Text),
        f("other", Text),
        f("s_n_num", Text),
        f("tag_num", Text),
        f("claim_num", Text),
        f("location", Text),
    ],
    positional: &[],
};

pub static COMMENT: RecordShape = RecordShape {
    name: "comment",
    fields: &[
        f("ticket_id", Integer),
        f("subject", Text),
        f("body", Text),
        f("tech", Text),
        f("hidden", Bool),
        f("user_id", Integer),
        f("created_at", DateTime),
        f("updated_at", DateTime),
    ],
    positional: &[],
};

pub static TICKET: RecordShape = RecordShape {
    name: "ticket",
    fields: &[
        f("number", Integer),
        f("subject", Text),
        f("customer_id", Integer),
        f("customer_business_then_name", Text),
        f("due_date", DateTime),
        f("resolved_at", DateTime),
        f("start_at", DateTime),
        f("end_at", DateTime),
        f("location_id", Integer),
        f("problem_type", Text),
        f("status", Text),
        f("priority", Text),
        f("ticket_type_id", Integer),
        f("user_id", Integer),
        f("pdf_url", Text),
        f("created_at", DateTime),
        f("updated_at", DateTime),
        f("properties", Nested(&TICKET_PROPERTIES)),
        f("comments", NestedList(&COMMENT)),
    ],
    positional: &[],
};

pub static TICKET_TYPE: RecordShape = RecordShape {
    name: "ticket_type",
    fields: &[f("name", Text)],
    positional: &[],
};

pub static TICKET_TYPE_FIELD: RecordShape = RecordShape {
    name: "ticket_type_field",
    fields: &[
        f("name", Text),
        f("field_type", Text),
        f("ticket_type_id", Integer),
        f("position", Integer),
        f("required", Bool),
    ],
    positional: &[],
};

pub static TICKET_TYPE_FIELD_ANSWER: RecordShape = RecordShape {
    name: "ticket_type_field_answer",
    fields: &[f("ticket_field_id", Integer), f("value", Text)],
    positional: &[],
};

pub static USER: RecordShape = RecordShape {
    name: "user",
    fields: &[
        f("email", Text),
        f("full_name", Text),
        f("group", Text),
        f("admin", Bool),
        f("color", Text),
        f("created_at", DateTime),
        f("updated_at", DateTime),
    ],
    positional: &["id", "full_name"],
};
