use serde::{Deserialize, Serialize};

use crate::db_types::MinorUnits;

/// A bare `{ "id": ... }` reference to another entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
}

impl IdRef {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProduct {
    pub id: String,
    #[serde(default)]
    pub seller: Option<IdRef>,
    #[serde(default)]
    pub type_id: Option<String>,
    #[serde(default)]
    pub categories: Vec<IdRef>,
}

impl CandidateProduct {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self { id: id.into(), ..Default::default() }
    }

    pub fn with_seller<S: Into<String>>(mut self, seller_id: S) -> Self {
        self.seller = Some(IdRef::new(seller_id));
        self
    }

    pub fn with_type<S: Into<String>>(mut self, type_id: S) -> Self {
        self.type_id = Some(type_id.into());
        self
    }

    pub fn with_category<S: Into<String>>(mut self, category_id: S) -> Self {
        self.categories.push(IdRef::new(category_id));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOption {
    #[serde(default)]
    pub shipping_option_type_id: Option<String>,
    #[serde(default)]
    pub seller: Option<IdRef>,
}

/// A line item or shipping method that may attract a commission.
///
/// Items describe themselves through `product`, shipping methods through `shipping_option`. Any attribute may be
/// missing; a missing attribute never matches a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub subtotal: MinorUnits,
    #[serde(default)]
    pub tax_total: Option<MinorUnits>,
    #[serde(default)]
    pub product: Option<CandidateProduct>,
    #[serde(default)]
    pub shipping_option: Option<ShippingOption>,
}

impl Candidate {
    pub fn new<S: Into<String>>(id: S, subtotal: i64) -> Self {
        Self {
            id: id.into(),
            subtotal: MinorUnits::from(subtotal),
            tax_total: None,
            product: None,
            shipping_option: None,
        }
    }

    pub fn with_tax(mut self, tax_total: i64) -> Self {
        self.tax_total = Some(MinorUnits::from(tax_total));
        self
    }

    pub fn with_product(mut self, product: CandidateProduct) -> Self {
        self.product = Some(product);
        self
    }

    pub fn with_shipping_option_type<S: Into<String>>(mut self, type_id: S) -> Self {
        let option = self.shipping_option.get_or_insert_with(ShippingOption::default);
        option.shipping_option_type_id = Some(type_id.into());
        self
    }

    pub fn with_shipping_seller<S: Into<String>>(mut self, seller_id: S) -> Self {
        let option = self.shipping_option.get_or_insert_with(ShippingOption::default);
        option.seller = Some(IdRef::new(seller_id));
        self
    }

    /// The seller of the product, or failing that, the seller offering the shipping option.
    pub fn seller_id(&self) -> Option<&str> {
        self.product
            .as_ref()
            .and_then(|p| p.seller.as_ref())
            .or_else(|| self.shipping_option.as_ref().and_then(|s| s.seller.as_ref()))
            .map(|s| s.id.as_str())
    }

    pub fn product_id(&self) -> Option<&str> {
        self.product.as_ref().map(|p| p.id.as_str())
    }

    pub fn product_type_id(&self) -> Option<&str> {
        self.product.as_ref().and_then(|p| p.type_id.as_deref())
    }

    pub fn category_ids(&self) -> impl Iterator<Item = &str> {
        self.product.iter().flat_map(|p| p.categories.iter().map(|c| c.id.as_str()))
    }

    pub fn shipping_option_type_id(&self) -> Option<&str> {
        self.shipping_option.as_ref().and_then(|s| s.shipping_option_type_id.as_deref())
    }
}

/// The input to a resolution call: all candidates are evaluated in `currency_code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveCommissionRequest {
    pub currency_code: String,
    #[serde(default)]
    pub items: Vec<Candidate>,
    #[serde(default)]
    pub shipping_methods: Vec<Candidate>,
}

impl ResolveCommissionRequest {
    pub fn new<S: Into<String>>(currency_code: S) -> Self {
        Self { currency_code: currency_code.into(), items: Vec::new(), shipping_methods: Vec::new() }
    }

    pub fn with_item(mut self, item: Candidate) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_shipping_method(mut self, method: Candidate) -> Self {
        self.shipping_methods.push(method);
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deserialize_request() {
        let json = r#"{
            "currency_code": "usd",
            "items": [{
                "id": "item_1",
                "subtotal": 10000,
                "tax_total": 1000,
                "product": {
                    "id": "prod_1",
                    "seller": { "id": "seller_1" },
                    "type_id": "ptype_1",
                    "categories": [{ "id": "cat_1" }, { "id": "cat_2" }]
                }
            }]
        }"#;
        let request: ResolveCommissionRequest = serde_json::from_str(json).unwrap();
        assert!(request.shipping_methods.is_empty());
        let item = &request.items[0];
        assert_eq!(item.seller_id(), Some("seller_1"));
        assert_eq!(item.product_id(), Some("prod_1"));
        assert_eq!(item.product_type_id(), Some("ptype_1"));
        assert_eq!(item.category_ids().collect::<Vec<_>>(), vec!["cat_1", "cat_2"]);
        assert_eq!(item.shipping_option_type_id(), None);
    }

    #[test]
    fn shipping_candidates() {
        let method = Candidate::new("sm_1", 500).with_shipping_option_type("express").with_shipping_seller("seller_9");
        assert_eq!(method.shipping_option_type_id(), Some("express"));
        assert_eq!(method.seller_id(), Some("seller_9"));
        assert_eq!(method.product_id(), None);
        assert_eq!(method.category_ids().count(), 0);
    }
}
