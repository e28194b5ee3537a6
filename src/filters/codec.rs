//! Bidirectional mapping between URL query strings and [`FilterCriteria`].

use super::{
    FilterCriteria, RangeFilter, RoomSelection, SearchFilters, SortDirection, SortKey, SortOrder,
    LIST_SEPARATOR, ROOM_MAX, ROOM_MIN,
};
use crate::models::OfferType;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use tracing::debug;
use url::form_urlencoded;

pub const PRICE_FROM: &str = "priceFrom";
pub const PRICE_TO: &str = "priceTo";
pub const AREA_FROM: &str = "areaFrom";
pub const AREA_TO: &str = "areaTo";
pub const FLOOR_FROM: &str = "floorFrom";
pub const FLOOR_TO: &str = "floorTo";
pub const ROOMS_FROM: &str = "roomsFrom";
pub const ROOMS_TO: &str = "roomsTo";
pub const ROOMS: &str = "rooms";
pub const PROPERTY_TYPES: &str = "propertyTypes";
pub const CITIES: &str = "cities";
pub const DISTRICTS: &str = "districts";
pub const REPAIRS: &str = "repairs";
pub const LANDMARK: &str = "landmark";
pub const OFFER_TYPE: &str = "offerType";
pub const LISTING_TYPE: &str = "listingType";
pub const SORT: &str = "sort";
pub const DIR: &str = "dir";

/// One encoded query parameter. Multi-value fields carry several values that
/// are comma-joined on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub name: &'static str,
    pub values: Vec<String>,
}

impl QueryParam {
    fn single(name: &'static str, value: impl ToString) -> Self {
        Self {
            name,
            values: vec![value.to_string()],
        }
    }

    fn list(name: &'static str, values: impl IntoIterator<Item = String>) -> Self {
        Self {
            name,
            values: values.into_iter().collect(),
        }
    }

    pub fn value(&self) -> String {
        self.values.join(",")
    }
}

/// Query-string codec for [`FilterCriteria`].
pub struct FilterCodec;

impl FilterCodec {
    /// Decode a query string. Accepts `a=b&c=d`, `?a=b` or a full URL.
    ///
    /// Malformed values are dropped one field at a time; decoding never fails.
    pub fn decode(input: &str) -> FilterCriteria {
        let input = input.trim();
        let query = if input.contains("://") {
            match url::Url::parse(input) {
                Ok(url) => url.query().unwrap_or_default().to_string(),
                Err(e) => {
                    debug!("Ignoring unparsable URL {:?}: {}", input, e);
                    String::new()
                }
            }
        } else {
            input.trim_start_matches('?').to_string()
        };

        Self::decode_pairs(form_urlencoded::parse(query.as_bytes()))
    }

    /// Decode from already-split key/value pairs. The first occurrence of a key wins.
    pub fn decode_pairs<I, K, V>(pairs: I) -> FilterCriteria
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params: HashMap<String, String> = HashMap::new();
        for (key, value) in pairs {
            params
                .entry(key.as_ref().to_string())
                .or_insert_with(|| value.as_ref().to_string());
        }
        let params = Params(params);

        let search = SearchFilters {
            price: params.range(PRICE_FROM, PRICE_TO),
            area: params.range(AREA_FROM, AREA_TO),
            floor: params.range(FLOOR_FROM, FLOOR_TO),
            rooms: params.rooms(),
            property_types: params.list(PROPERTY_TYPES),
            cities: params.list(CITIES),
            districts: params.list(DISTRICTS),
            repairs: params.list(REPAIRS),
            landmark: params.text(LANDMARK),
            offer_type: params.parsed(OFFER_TYPE, OfferType::parse),
            listing_type: params.text(LISTING_TYPE),
        };

        let sort = SortOrder {
            key: params.parsed(SORT, SortKey::parse),
            direction: params
                .parsed(DIR, SortDirection::parse)
                .unwrap_or_default(),
        };

        FilterCriteria::new(search, sort).canonical()
    }

    /// Encode to parameters in a fixed order, omitting unconstrained fields.
    /// The canonical form is encoded, so equal filters always encode equally.
    pub fn encode(criteria: &FilterCriteria) -> Vec<QueryParam> {
        let criteria = criteria.clone().canonical();
        let search = &criteria.search;
        let mut params = Vec::new();

        push_range(&mut params, PRICE_FROM, PRICE_TO, &search.price);
        push_range(&mut params, AREA_FROM, AREA_TO, &search.area);
        push_range(&mut params, FLOOR_FROM, FLOOR_TO, &search.floor);

        if let Some(rooms) = &search.rooms {
            if rooms.is_contiguous() {
                if rooms.min() > ROOM_MIN {
                    params.push(QueryParam::single(ROOMS_FROM, rooms.min()));
                }
                if rooms.max() < ROOM_MAX {
                    params.push(QueryParam::single(ROOMS_TO, rooms.max()));
                }
            } else {
                params.push(QueryParam::list(
                    ROOMS,
                    rooms.values().map(|v| v.to_string()),
                ));
            }
        }

        push_set(&mut params, PROPERTY_TYPES, &search.property_types);
        push_set(&mut params, CITIES, &search.cities);
        push_set(&mut params, DISTRICTS, &search.districts);
        push_set(&mut params, REPAIRS, &search.repairs);

        if let Some(landmark) = &search.landmark {
            params.push(QueryParam::single(LANDMARK, landmark));
        }
        if let Some(offer_type) = search.offer_type {
            params.push(QueryParam::single(OFFER_TYPE, offer_type.as_str()));
        }
        if let Some(listing_type) = &search.listing_type {
            params.push(QueryParam::single(LISTING_TYPE, listing_type));
        }

        if let Some(key) = criteria.sort.key {
            params.push(QueryParam::single(SORT, key.as_str()));
        }
        if criteria.sort.direction != SortDirection::default() {
            params.push(QueryParam::single(DIR, criteria.sort.direction.as_str()));
        }

        params
    }

    /// Encoded parameters as plain key/value pairs, suitable for an HTTP client.
    pub fn encode_pairs(criteria: &FilterCriteria) -> Vec<(&'static str, String)> {
        Self::encode(criteria)
            .into_iter()
            .map(|p| (p.name, p.value()))
            .collect()
    }

    /// Canonical query string without a leading `?`. Commas between values of a
    /// multi-value field are kept literal; everything else is form-encoded.
    pub fn to_query_string(criteria: &FilterCriteria) -> String {
        Self::encode(criteria)
            .iter()
            .map(|param| {
                let value = param
                    .values
                    .iter()
                    .map(|v| form_urlencoded::byte_serialize(v.as_bytes()).collect::<String>())
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}={}", param.name, value)
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn push_range<T: ToString>(
    params: &mut Vec<QueryParam>,
    from_name: &'static str,
    to_name: &'static str,
    range: &RangeFilter<T>,
) {
    if let Some(from) = &range.from {
        params.push(QueryParam::single(from_name, from.to_string()));
    }
    if let Some(to) = &range.to {
        params.push(QueryParam::single(to_name, to.to_string()));
    }
}

fn push_set(params: &mut Vec<QueryParam>, name: &'static str, set: &BTreeSet<String>) {
    if !set.is_empty() {
        params.push(QueryParam::list(name, set.iter().cloned()));
    }
}

struct Params(HashMap<String, String>);

impl Params {
    fn raw(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, key: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let raw = self.raw(key)?;
        let value = parse(raw);
        if value.is_none() {
            debug!(param = key, value = raw, "Dropping malformed filter value");
        }
        value
    }

    fn number<T: FromStr>(&self, key: &str) -> Option<T> {
        self.parsed(key, |raw| raw.parse().ok())
    }

    fn range<T: FromStr>(&self, from: &str, to: &str) -> RangeFilter<T> {
        RangeFilter {
            from: self.number(from),
            to: self.number(to),
        }
    }

    fn text(&self, key: &str) -> Option<String> {
        self.raw(key).map(str::to_string)
    }

    fn list(&self, key: &str) -> BTreeSet<String> {
        self.raw(key)
            .map(|raw| {
                raw.split(LIST_SEPARATOR)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn room_bound(&self, key: &str) -> Option<u8> {
        self.parsed(key, |raw| {
            raw.parse::<u8>()
                .ok()
                .filter(|v| (ROOM_MIN..=ROOM_MAX).contains(v))
        })
    }

    /// The discrete `rooms` form wins over `roomsFrom`/`roomsTo` when it holds
    /// at least one valid value.
    fn rooms(&self) -> Option<RoomSelection> {
        if let Some(raw) = self.raw(ROOMS) {
            let values: Vec<u8> = raw
                .split(LIST_SEPARATOR)
                .filter_map(|v| {
                    let parsed = v
                        .trim()
                        .parse::<u8>()
                        .ok()
                        .filter(|v| (ROOM_MIN..=ROOM_MAX).contains(v));
                    if parsed.is_none() {
                        debug!(param = ROOMS, value = v, "Dropping malformed room value");
                    }
                    parsed
                })
                .collect();
            if !values.is_empty() {
                return RoomSelection::new(values);
            }
        }

        let from = self.room_bound(ROOMS_FROM);
        let to = self.room_bound(ROOMS_TO);
        if from.is_none() && to.is_none() {
            return None;
        }
        RoomSelection::range(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn sample_criteria() -> FilterCriteria {
        let mut search = SearchFilters {
            price: RangeFilter::between(50_000, 120_000),
            area: RangeFilter::at_least(40),
            floor: RangeFilter::at_most(9),
            rooms: RoomSelection::new([1, 3, 5]),
            landmark: Some("near the central park".to_string()),
            offer_type: Some(OfferType::Rent),
            listing_type: Some("new_building".to_string()),
            ..SearchFilters::default()
        };
        search.property_types.insert("flat".to_string());
        search.property_types.insert("house".to_string());
        search.cities.insert("Tashkent".to_string());
        search.districts.insert("Yunusabad".to_string());
        search.districts.insert("Chilonzor".to_string());
        search.repairs.insert("euro".to_string());
        FilterCriteria::new(search, SortOrder::by(SortKey::TotalArea, SortDirection::Asc))
    }

    #[test]
    fn contiguous_rooms_encode_as_range() {
        let mut criteria = FilterCriteria::default();
        criteria.search.offer_type = Some(OfferType::Sale);
        criteria.search.price = RangeFilter::at_least(50_000);
        criteria.search.rooms = RoomSelection::new([2, 3]);

        assert_eq!(
            FilterCodec::to_query_string(&criteria),
            "priceFrom=50000&roomsFrom=2&roomsTo=3&offerType=sale"
        );
    }

    #[test]
    fn non_contiguous_rooms_encode_as_list() {
        let mut criteria = FilterCriteria::default();
        criteria.search.offer_type = Some(OfferType::Sale);
        criteria.search.price = RangeFilter::at_least(50_000);
        criteria.search.rooms = RoomSelection::new([4, 2]);

        assert_eq!(
            FilterCodec::to_query_string(&criteria),
            "priceFrom=50000&rooms=2,4&offerType=sale"
        );
    }

    #[test]
    fn open_ended_room_ranges_omit_the_implied_bound() {
        let mut criteria = FilterCriteria::default();
        criteria.search.rooms = RoomSelection::new([3, 4, 5]);
        assert_eq!(FilterCodec::to_query_string(&criteria), "roomsFrom=3");

        criteria.search.rooms = RoomSelection::new([1, 2]);
        assert_eq!(FilterCodec::to_query_string(&criteria), "roomsTo=2");
    }

    #[test]
    fn all_rooms_selected_encodes_nothing() {
        let decoded = FilterCodec::decode("rooms=1,2,3,4,5");
        assert_eq!(decoded.search.rooms, None);
        assert_eq!(FilterCodec::to_query_string(&decoded), "");
    }

    #[test]
    fn round_trip_is_lossless() {
        let criteria = sample_criteria();
        let encoded = FilterCodec::to_query_string(&criteria);
        let decoded = FilterCodec::decode(&encoded);

        assert_eq!(decoded, criteria.clone().canonical());
        assert_eq!(FilterCodec::to_query_string(&decoded), encoded);
    }

    #[test]
    fn multi_value_order_is_canonicalized() {
        let a = FilterCodec::decode("districts=Yunusabad,Chilonzor&propertyTypes=house,flat");
        let b = FilterCodec::decode("propertyTypes=flat,house&districts=Chilonzor,Yunusabad");

        assert_eq!(a, b);
        assert_eq!(
            FilterCodec::to_query_string(&a),
            "propertyTypes=flat,house&districts=Chilonzor,Yunusabad"
        );
    }

    #[test]
    fn range_bounds_are_independent() {
        let only_from = FilterCodec::decode("priceFrom=100");
        assert_eq!(only_from.search.price, RangeFilter::at_least(100));

        let only_to = FilterCodec::decode("?areaTo=80");
        assert_eq!(only_to.search.area, RangeFilter::at_most(80));

        let both = FilterCodec::decode("floorFrom=-1&floorTo=4");
        assert_eq!(both.search.floor, RangeFilter::between(-1, 4));
    }

    #[test]
    fn malformed_fields_are_dropped_individually() {
        let decoded = FilterCodec::decode(
            "priceFrom=abc&priceTo=90000&rooms=2,x,4&sort=cheapest&dir=sideways&offerType=lease&areaFrom=",
        );

        assert_eq!(decoded.search.price, RangeFilter::at_most(90_000));
        assert_eq!(decoded.search.rooms, RoomSelection::new([2, 4]));
        assert_eq!(decoded.search.offer_type, None);
        assert_eq!(decoded.search.area, RangeFilter::default());
        assert_eq!(decoded.sort, SortOrder::default());
    }

    #[test]
    fn discrete_rooms_win_over_range() {
        let decoded = FilterCodec::decode("roomsFrom=1&roomsTo=2&rooms=3,5");
        assert_eq!(decoded.search.rooms, RoomSelection::new([3, 5]));

        let fallback = FilterCodec::decode("roomsFrom=2&roomsTo=3&rooms=zero");
        assert_eq!(fallback.search.rooms, RoomSelection::new([2, 3]));
    }

    #[test]
    fn out_of_range_room_bounds_are_dropped() {
        let decoded = FilterCodec::decode("roomsFrom=0&roomsTo=3");
        assert_eq!(decoded.search.rooms, RoomSelection::new([1, 2, 3]));
    }

    #[test]
    fn page_and_unknown_params_are_ignored() {
        let decoded = FilterCodec::decode("page=4&utm_source=mail&priceTo=10");
        assert_eq!(FilterCodec::to_query_string(&decoded), "priceTo=10");
    }

    #[test]
    fn first_occurrence_wins() {
        let decoded = FilterCodec::decode("priceFrom=10&priceFrom=20");
        assert_eq!(decoded.search.price.from, Some(10));
    }

    #[test]
    fn default_direction_is_not_encoded() {
        let desc = FilterCriteria::default().with_sort(SortOrder::by(SortKey::Date, SortDirection::Desc));
        assert_eq!(FilterCodec::to_query_string(&desc), "sort=date");

        let decoded = FilterCodec::decode("sort=price&dir=asc");
        assert_eq!(decoded.sort, SortOrder::by(SortKey::Price, SortDirection::Asc));
        assert_eq!(FilterCodec::to_query_string(&decoded), "sort=price&dir=asc");
    }

    #[test]
    fn free_text_survives_encoding() {
        let decoded = FilterCodec::decode("landmark=Amir+Temur+square%21");
        assert_eq!(decoded.search.landmark.as_deref(), Some("Amir Temur square!"));
        assert_eq!(
            FilterCodec::to_query_string(&decoded),
            "landmark=Amir+Temur+square%21"
        );
    }

    #[test]
    fn full_urls_are_accepted() {
        let decoded = FilterCodec::decode("https://example.com/properties?cities=Samarkand&sort=price");
        assert!(decoded.search.cities.contains("Samarkand"));
        assert_eq!(decoded.sort.key, Some(SortKey::Price));
    }

    #[test]
    fn encode_pairs_join_list_values() {
        let pairs = FilterCodec::encode_pairs(&sample_criteria());
        assert!(pairs.contains(&("rooms", "1,3,5".to_string())));
        assert!(pairs.contains(&("districts", "Chilonzor,Yunusabad".to_string())));
    }

    #[test]
    fn every_room_subset_round_trips() {
        for mask in 0u8..32 {
            let values: Vec<u8> = (ROOM_MIN..=ROOM_MAX)
                .filter(|v| mask & (1 << (v - 1)) != 0)
                .collect();
            for floor in [RangeFilter::default(), RangeFilter::between(-2, 1), RangeFilter::at_least(12)] {
                let mut criteria = FilterCriteria::default();
                criteria.search.rooms = RoomSelection::new(values.clone());
                criteria.search.floor = floor;
                criteria.search.price = RangeFilter::between(90_000, 10_000);

                let encoded = FilterCodec::to_query_string(&criteria);
                let decoded = FilterCodec::decode(&encoded);
                assert_eq!(decoded, criteria, "rooms {:?} encoded as {}", values, encoded);
                assert_eq!(FilterCodec::to_query_string(&decoded), encoded);
            }
        }
    }

    #[test]
    fn members_with_reserved_characters_round_trip() {
        let mut criteria = FilterCriteria::default();
        criteria.search.districts.insert("Mirzo Ulugbek".to_string());
        criteria.search.districts.insert("100% new & shiny".to_string());
        criteria.search.repairs.insert("a=b?c#d/e:f+g".to_string());

        let encoded = FilterCodec::to_query_string(&criteria);
        assert_eq!(FilterCodec::decode(&encoded), criteria);
    }

    #[test]
    fn comma_members_are_not_encoded() {
        let mut criteria = FilterCriteria::default();
        criteria.search.cities.insert("Tashkent, Uzbekistan".to_string());
        criteria.search.cities.insert("Bukhara".to_string());

        assert_eq!(FilterCodec::to_query_string(&criteria), "cities=Bukhara");
    }

    fn text() -> impl Strategy<Value = String> {
        "[ a-zA-Z0-9%&+=/:?#,.\u{e9}-]{0,10}"
    }

    fn range<T: Arbitrary + Copy>() -> impl Strategy<Value = RangeFilter<T>> {
        (any::<Option<T>>(), any::<Option<T>>()).prop_map(|(from, to)| RangeFilter { from, to })
    }

    fn set() -> impl Strategy<Value = BTreeSet<String>> {
        prop::collection::btree_set(text(), 0..4)
    }

    fn criteria() -> impl Strategy<Value = FilterCriteria> {
        let rooms = prop::collection::vec(any::<bool>(), 5).prop_map(|mask| {
            RoomSelection::new((ROOM_MIN..=ROOM_MAX).filter(|v| mask[usize::from(v - 1)]))
        });
        let offer_type = prop::option::of(prop_oneof![Just(OfferType::Sale), Just(OfferType::Rent)]);
        let sort = (
            prop::option::of(prop::sample::select(SortKey::ALL.to_vec())),
            prop_oneof![Just(SortDirection::Asc), Just(SortDirection::Desc)],
        )
            .prop_map(|(key, direction)| SortOrder { key, direction });

        (
            range::<u64>(),
            range::<u32>(),
            range::<i32>(),
            rooms,
            set(),
            set(),
            set(),
            set(),
            prop::option::of(text()),
            offer_type,
            prop::option::of(text()),
            sort,
        )
            .prop_map(
                |(price, area, floor, rooms, property_types, cities, districts, repairs, landmark, offer_type, listing_type, sort)| {
                    let search = SearchFilters {
                        price,
                        area,
                        floor,
                        rooms,
                        property_types,
                        cities,
                        districts,
                        repairs,
                        landmark,
                        offer_type,
                        listing_type,
                    };
                    FilterCriteria::new(search, sort)
                },
            )
    }

    proptest! {
        #[test]
        fn decode_of_encode_is_the_canonical_value(criteria in criteria()) {
            let encoded = FilterCodec::to_query_string(&criteria);
            let decoded = FilterCodec::decode(&encoded);
            prop_assert_eq!(&decoded, &criteria.clone().canonical());
            prop_assert_eq!(FilterCodec::to_query_string(&decoded), encoded);
        }

        #[test]
        fn encoding_ignores_how_the_value_was_written(criteria in criteria()) {
            let canonical = criteria.clone().canonical();
            prop_assert_eq!(FilterCodec::encode(&criteria), FilterCodec::encode(&canonical));
            prop_assert_eq!(criteria.identity(), canonical.identity());
        }
    }
}
