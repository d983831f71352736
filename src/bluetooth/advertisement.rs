use crate::Result;
use bluer::{
    Adapter,
    adv::{AdvertisementHandle, Advertisement, Type},
};
use uuid::Uuid;

pub async fn create_advertisement(adapter: &Adapter, service: Uuid, name: &str) -> Result<AdvertisementHandle> {
    // Connectable: a configuration client has to be able to open a link.
    let le_advertisement = Advertisement {
        advertisement_type: Type::Peripheral,
        service_uuids: vec![service].into_iter().collect(),
        discoverable: Some(true),
        local_name: Some(name.to_string()),
        ..Default::default()
    };

    let handle = adapter.advertise(le_advertisement).await?;
    Ok(handle)
}
