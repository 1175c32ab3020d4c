//! The canonical product listing record and its declared field set

use serde::{Deserialize, Serialize};

/// Storage type of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Whole number (ids, counts)
    Integer,
    /// Real number (prices, rates, ratings)
    Decimal,
    /// Trimmed text
    Text,
    /// Boolean stored as 0/1
    Flag,
}

/// Every column the pipeline reads from the source and writes to `processed_data`.
///
/// Order matches the column order of the `processed_data` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ProductId,
    SkuId,
    ProductName,
    BrandName,
    Description,
    SellerName,
    SellerUrl,
    SellerRating,
    BusinessType,
    BusinessArea,
    Availability,
    VentureCategory1NameEn,
    VentureCategory2NameEn,
    VentureCategory3NameEn,
    VentureCategoryNameLocal,
    ProductUrl,
    Deeplink,
    ProductSmallImg,
    ProductMediumImg,
    ProductBigImg,
    ImageUrl2,
    ImageUrl3,
    ImageUrl4,
    ImageUrl5,
    Price,
    CurrentPrice,
    PromotionPrice,
    DiscountPercentage,
    PlatformCommissionRate,
    ProductCommissionRate,
    BonusCommissionRate,
    RatingAvgValue,
    NumberOfReviews,
    IsFreeShipping,
}

impl Field {
    /// All declared fields in table column order
    pub const ALL: [Field; 34] = [
        Field::ProductId,
        Field::SkuId,
        Field::ProductName,
        Field::BrandName,
        Field::Description,
        Field::SellerName,
        Field::SellerUrl,
        Field::SellerRating,
        Field::BusinessType,
        Field::BusinessArea,
        Field::Availability,
        Field::VentureCategory1NameEn,
        Field::VentureCategory2NameEn,
        Field::VentureCategory3NameEn,
        Field::VentureCategoryNameLocal,
        Field::ProductUrl,
        Field::Deeplink,
        Field::ProductSmallImg,
        Field::ProductMediumImg,
        Field::ProductBigImg,
        Field::ImageUrl2,
        Field::ImageUrl3,
        Field::ImageUrl4,
        Field::ImageUrl5,
        Field::Price,
        Field::CurrentPrice,
        Field::PromotionPrice,
        Field::DiscountPercentage,
        Field::PlatformCommissionRate,
        Field::ProductCommissionRate,
        Field::BonusCommissionRate,
        Field::RatingAvgValue,
        Field::NumberOfReviews,
        Field::IsFreeShipping,
    ];

    /// Column name, both in the source CSV header and in `processed_data`
    pub fn name(&self) -> &'static str {
        match self {
            Field::ProductId => "product_id",
            Field::SkuId => "sku_id",
            Field::ProductName => "product_name",
            Field::BrandName => "brand_name",
            Field::Description => "description",
            Field::SellerName => "seller_name",
            Field::SellerUrl => "seller_url",
            Field::SellerRating => "seller_rating",
            Field::BusinessType => "business_type",
            Field::BusinessArea => "business_area",
            Field::Availability => "availability",
            Field::VentureCategory1NameEn => "venture_category1_name_en",
            Field::VentureCategory2NameEn => "venture_category2_name_en",
            Field::VentureCategory3NameEn => "venture_category3_name_en",
            Field::VentureCategoryNameLocal => "venture_category_name_local",
            Field::ProductUrl => "product_url",
            Field::Deeplink => "deeplink",
            Field::ProductSmallImg => "product_small_img",
            Field::ProductMediumImg => "product_medium_img",
            Field::ProductBigImg => "product_big_img",
            Field::ImageUrl2 => "image_url_2",
            Field::ImageUrl3 => "image_url_3",
            Field::ImageUrl4 => "image_url_4",
            Field::ImageUrl5 => "image_url_5",
            Field::Price => "price",
            Field::CurrentPrice => "current_price",
            Field::PromotionPrice => "promotion_price",
            Field::DiscountPercentage => "discount_percentage",
            Field::PlatformCommissionRate => "platform_commission_rate",
            Field::ProductCommissionRate => "product_commission_rate",
            Field::BonusCommissionRate => "bonus_commission_rate",
            Field::RatingAvgValue => "rating_avg_value",
            Field::NumberOfReviews => "number_of_reviews",
            Field::IsFreeShipping => "is_free_shipping",
        }
    }

    /// How the raw value is coerced
    pub fn kind(&self) -> FieldKind {
        match self {
            Field::ProductId | Field::SkuId | Field::NumberOfReviews => FieldKind::Integer,
            Field::SellerRating
            | Field::Price
            | Field::CurrentPrice
            | Field::PromotionPrice
            | Field::DiscountPercentage
            | Field::PlatformCommissionRate
            | Field::ProductCommissionRate
            | Field::BonusCommissionRate
            | Field::RatingAvgValue => FieldKind::Decimal,
            Field::IsFreeShipping => FieldKind::Flag,
            _ => FieldKind::Text,
        }
    }

    /// Look a field up by its column name (exact match)
    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.name() == name)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One cleaned product listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub product_id: Option<i64>,
    pub sku_id: Option<i64>,
    pub product_name: Option<String>,
    pub brand_name: Option<String>,
    pub description: Option<String>,
    pub seller_name: Option<String>,
    pub seller_url: Option<String>,
    pub seller_rating: Option<f64>,
    pub business_type: Option<String>,
    pub business_area: Option<String>,
    pub availability: Option<String>,
    pub venture_category1_name_en: Option<String>,
    pub venture_category2_name_en: Option<String>,
    pub venture_category3_name_en: Option<String>,
    pub venture_category_name_local: Option<String>,
    pub product_url: Option<String>,
    pub deeplink: Option<String>,
    pub product_small_img: Option<String>,
    pub product_medium_img: Option<String>,
    pub product_big_img: Option<String>,
    pub image_url_2: Option<String>,
    pub image_url_3: Option<String>,
    pub image_url_4: Option<String>,
    pub image_url_5: Option<String>,
    pub price: Option<f64>,
    pub current_price: Option<f64>,
    pub promotion_price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub platform_commission_rate: Option<f64>,
    pub product_commission_rate: Option<f64>,
    pub bonus_commission_rate: Option<f64>,
    pub rating_avg_value: Option<f64>,
    pub number_of_reviews: Option<i64>,
    pub is_free_shipping: Option<bool>,
    /// Name of the file the record was read from
    pub source_file: String,
    /// Identifier of the run that produced the record
    pub processing_batch: String,
}

/// A typed value for one field, used when binding a record to a statement
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Integer(Option<i64>),
    Decimal(Option<f64>),
    Text(Option<&'a str>),
    Flag(Option<bool>),
}

impl FieldValue<'_> {
    /// Whether the value is null
    pub fn is_null(&self) -> bool {
        match self {
            FieldValue::Integer(v) => v.is_none(),
            FieldValue::Decimal(v) => v.is_none(),
            FieldValue::Text(v) => v.is_none(),
            FieldValue::Flag(v) => v.is_none(),
        }
    }
}

impl CanonicalRecord {
    /// Create an empty record stamped with its provenance
    pub fn new(source_file: impl Into<String>, processing_batch: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            processing_batch: processing_batch.into(),
            ..Default::default()
        }
    }

    /// Read one field
    pub fn get(&self, field: Field) -> FieldValue<'_> {
        match field {
            Field::ProductId => FieldValue::Integer(self.product_id),
            Field::SkuId => FieldValue::Integer(self.sku_id),
            Field::ProductName => FieldValue::Text(self.product_name.as_deref()),
            Field::BrandName => FieldValue::Text(self.brand_name.as_deref()),
            Field::Description => FieldValue::Text(self.description.as_deref()),
            Field::SellerName => FieldValue::Text(self.seller_name.as_deref()),
            Field::SellerUrl => FieldValue::Text(self.seller_url.as_deref()),
            Field::SellerRating => FieldValue::Decimal(self.seller_rating),
            Field::BusinessType => FieldValue::Text(self.business_type.as_deref()),
            Field::BusinessArea => FieldValue::Text(self.business_area.as_deref()),
            Field::Availability => FieldValue::Text(self.availability.as_deref()),
            Field::VentureCategory1NameEn => {
                FieldValue::Text(self.venture_category1_name_en.as_deref())
            }
            Field::VentureCategory2NameEn => {
                FieldValue::Text(self.venture_category2_name_en.as_deref())
            }
            Field::VentureCategory3NameEn => {
                FieldValue::Text(self.venture_category3_name_en.as_deref())
            }
            Field::VentureCategoryNameLocal => {
                FieldValue::Text(self.venture_category_name_local.as_deref())
            }
            Field::ProductUrl => FieldValue::Text(self.product_url.as_deref()),
            Field::Deeplink => FieldValue::Text(self.deeplink.as_deref()),
            Field::ProductSmallImg => FieldValue::Text(self.product_small_img.as_deref()),
            Field::ProductMediumImg => FieldValue::Text(self.product_medium_img.as_deref()),
            Field::ProductBigImg => FieldValue::Text(self.product_big_img.as_deref()),
            Field::ImageUrl2 => FieldValue::Text(self.image_url_2.as_deref()),
            Field::ImageUrl3 => FieldValue::Text(self.image_url_3.as_deref()),
            Field::ImageUrl4 => FieldValue::Text(self.image_url_4.as_deref()),
            Field::ImageUrl5 => FieldValue::Text(self.image_url_5.as_deref()),
            Field::Price => FieldValue::Decimal(self.price),
            Field::CurrentPrice => FieldValue::Decimal(self.current_price),
            Field::PromotionPrice => FieldValue::Decimal(self.promotion_price),
            Field::DiscountPercentage => FieldValue::Decimal(self.discount_percentage),
            Field::PlatformCommissionRate => FieldValue::Decimal(self.platform_commission_rate),
            Field::ProductCommissionRate => FieldValue::Decimal(self.product_commission_rate),
            Field::BonusCommissionRate => FieldValue::Decimal(self.bonus_commission_rate),
            Field::RatingAvgValue => FieldValue::Decimal(self.rating_avg_value),
            Field::NumberOfReviews => FieldValue::Integer(self.number_of_reviews),
            Field::IsFreeShipping => FieldValue::Flag(self.is_free_shipping),
        }
    }

    /// Set a text field. Non-text fields are left untouched.
    pub fn set_text(&mut self, field: Field, value: Option<String>) {
        let slot = match field {
            Field::ProductName => &mut self.product_name,
            Field::BrandName => &mut self.brand_name,
            Field::Description => &mut self.description,
            Field::SellerName => &mut self.seller_name,
            Field::SellerUrl => &mut self.seller_url,
            Field::BusinessType => &mut self.business_type,
            Field::BusinessArea => &mut self.business_area,
            Field::Availability => &mut self.availability,
            Field::VentureCategory1NameEn => &mut self.venture_category1_name_en,
            Field::VentureCategory2NameEn => &mut self.venture_category2_name_en,
            Field::VentureCategory3NameEn => &mut self.venture_category3_name_en,
            Field::VentureCategoryNameLocal => &mut self.venture_category_name_local,
            Field::ProductUrl => &mut self.product_url,
            Field::Deeplink => &mut self.deeplink,
            Field::ProductSmallImg => &mut self.product_small_img,
            Field::ProductMediumImg => &mut self.product_medium_img,
            Field::ProductBigImg => &mut self.product_big_img,
            Field::ImageUrl2 => &mut self.image_url_2,
            Field::ImageUrl3 => &mut self.image_url_3,
            Field::ImageUrl4 => &mut self.image_url_4,
            Field::ImageUrl5 => &mut self.image_url_5,
            _ => return,
        };
        *slot = value;
    }

    /// Set an integer field. Non-integer fields are left untouched.
    pub fn set_integer(&mut self, field: Field, value: Option<i64>) {
        match field {
            Field::ProductId => self.product_id = value,
            Field::SkuId => self.sku_id = value,
            Field::NumberOfReviews => self.number_of_reviews = value,
            _ => {}
        }
    }

    /// Set a decimal field. Non-decimal fields are left untouched.
    pub fn set_decimal(&mut self, field: Field, value: Option<f64>) {
        let slot = match field {
            Field::SellerRating => &mut self.seller_rating,
            Field::Price => &mut self.price,
            Field::CurrentPrice => &mut self.current_price,
            Field::PromotionPrice => &mut self.promotion_price,
            Field::DiscountPercentage => &mut self.discount_percentage,
            Field::PlatformCommissionRate => &mut self.platform_commission_rate,
            Field::ProductCommissionRate => &mut self.product_commission_rate,
            Field::BonusCommissionRate => &mut self.bonus_commission_rate,
            Field::RatingAvgValue => &mut self.rating_avg_value,
            _ => return,
        };
        *slot = value;
    }

    /// Composite dedup key, present only when all three components are
    pub fn dedup_key(&self) -> Option<(i64, i64, &str)> {
        Some((self.product_id?, self.sku_id?, self.seller_name.as_deref()?))
    }

    /// Whether the record keeps at least one usable identifier
    pub fn has_identifier(&self) -> bool {
        self.product_id.is_some() || self.product_name.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_name(field.name()), Some(field));
        }
        assert_eq!(Field::from_name("Product_ID"), None);
        assert_eq!(Field::from_name("source_file"), None);
    }

    #[test]
    fn test_questionable_numeric_columns_are_text() {
        assert_eq!(Field::Description.kind(), FieldKind::Text);
        assert_eq!(Field::ImageUrl4.kind(), FieldKind::Text);
        assert_eq!(Field::ImageUrl5.kind(), FieldKind::Text);
        assert_eq!(Field::IsFreeShipping.kind(), FieldKind::Flag);
    }

    #[test]
    fn test_dedup_key_requires_all_components() {
        let mut record = CanonicalRecord::new("f.csv", "b");
        record.product_id = Some(1);
        record.sku_id = Some(10);
        assert_eq!(record.dedup_key(), None);

        record.seller_name = Some("A".to_string());
        assert_eq!(record.dedup_key(), Some((1, 10, "A")));
    }

    #[test]
    fn test_setters_ignore_mismatched_kinds() {
        let mut record = CanonicalRecord::new("f.csv", "b");
        record.set_text(Field::Price, Some("9.99".to_string()));
        record.set_decimal(Field::ProductName, Some(1.0));
        assert_eq!(record.price, None);
        assert_eq!(record.product_name, None);

        record.set_decimal(Field::Price, Some(9.99));
        assert_eq!(record.get(Field::Price), FieldValue::Decimal(Some(9.99)));
    }
}
