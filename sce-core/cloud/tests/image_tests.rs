//! 镜像 API 集成测试

mod common;

use std::time::Duration;

use common::{MockCloud, ACCOUNT};
use sce_cloud::*;

const IMAGES: &str = r#"<DescribeImagesResponse>
  <Image>
    <ID>img-1</ID><Name>Web Tier</Name><Description>Nightly BUILD of the web tier</Description>
    <Location>41</Location><State>1</State><Owner>20012345</Owner>
    <Platform>Red Hat Enterprise Linux/6</Platform><Architecture>x86_64</Architecture>
    <Visibility>PRIVATE</Visibility>
  </Image>
  <Image>
    <ID>img-2</ID><Name>SUSE Linux Enterprise Server 11</Name>
    <Location>41</Location><State>1</State><Owner>SYSTEM</Owner>
    <Architecture>i386</Architecture><Visibility>PUBLIC</Visibility>
  </Image>
  <Image>
    <ID>img-3</ID><Name>Windows Server 2008</Name>
    <Location>41</Location><State>1</State><Owner>SYSTEM</Owner>
    <Architecture>x86_64</Architecture><Visibility>PUBLIC</Visibility>
  </Image>
  <Image>
    <ID>img-4</ID><Name>Web Tier copy</Name>
    <Location>82</Location><State>1</State><Owner>20012345</Owner>
  </Image>
</DescribeImagesResponse>"#;

fn image(id: &str, state: &str) -> String {
    format!(
        "<DescribeImageResponse><Image><ID>{}</ID><Name>snapshot</Name><Location>41</Location><State>{}</State><Owner>20012345</Owner></Image></DescribeImageResponse>",
        id, state
    )
}

const CAPTURED: &str = "<SaveInstanceResponse><Image><ID>img-9</ID><Name>snapshot</Name><Location>41</Location><State>0</State></Image></SaveInstanceResponse>";

#[tokio::test]
async fn test_list_owned_images() {
    let cloud = MockCloud::start().await;
    cloud.route("GET", "offerings/image", 200, IMAGES);

    let owned = cloud.client().image().list().await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, "img-1");
    assert_eq!(owned[0].owner.as_deref(), Some(ACCOUNT));
    assert_eq!(owned[0].platform, Platform::RedHat);

    let system = cloud.client().image().list_owned_by("SYSTEM").await.unwrap();
    assert_eq!(system.len(), 2);
}

#[tokio::test]
async fn test_search_filters() {
    let cloud = MockCloud::start().await;
    cloud.route("GET", "offerings/image", 200, IMAGES);
    let client = cloud.client();
    let images = client.image();

    let ids = |found: Vec<MachineImage>| found.into_iter().map(|i| i.id).collect::<Vec<_>>();

    // 关键字同时匹配名称和描述，忽略大小写
    assert_eq!(ids(images.search(Some("build"), None, None).await.unwrap()), vec!["img-1"]);
    assert_eq!(ids(images.search(Some("WEB"), None, None).await.unwrap()), vec!["img-1"]);

    assert_eq!(
        ids(images.search(None, Some(Platform::Unix), None).await.unwrap()),
        vec!["img-1", "img-2"]
    );
    assert_eq!(
        ids(images.search(None, Some(Platform::Windows), None).await.unwrap()),
        vec!["img-3"]
    );
    assert_eq!(
        ids(images.search(None, None, Some(Architecture::I32)).await.unwrap()),
        vec!["img-2"]
    );
    assert_eq!(images.search(None, None, None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_get_falls_back_to_listing_on_500() {
    let cloud = MockCloud::start().await;
    cloud.route("GET", "offerings/image/img-2", 500, "Internal error");
    cloud.route("GET", "offerings/image/nope", 500, "Internal error");
    cloud.route("GET", "offerings/image", 200, IMAGES);
    let client = cloud.client();

    let found = client.image().get("img-2").await.unwrap().unwrap();
    assert_eq!(found.architecture, Architecture::I32);
    assert_eq!(found.description, "SUSE Linux Enterprise Server 11 [#img-2]");
    assert!(client.image().get("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_capture_async_completes_when_active() {
    let cloud = MockCloud::start().await;
    cloud.route("PUT", "instances/vm-1", 200, CAPTURED);
    let saving = image("img-9", "0");
    let active = image("img-9", "1");
    cloud.sequence(
        "GET",
        "offerings/image/img-9",
        &[(200, &saving), (200, &saving), (200, &active)],
    );

    let task = cloud
        .client()
        .image()
        .capture_async("vm-1", "snapshot", "nightly");
    assert_eq!(task.vm_id(), "vm-1");

    let captured = task.wait().await.unwrap();
    assert_eq!(captured.id, "img-9");
    assert_eq!(captured.state, ImageState::Active);

    let put = &cloud.requests_to("PUT", "instances/vm-1")[0];
    assert_eq!(put.param("state").as_deref(), Some("save"));
    assert_eq!(put.param("name").as_deref(), Some("snapshot"));
    assert_eq!(put.param("description").as_deref(), Some("nightly"));
    assert_eq!(cloud.count("GET", "offerings/image/img-9"), 3);
}

#[tokio::test]
async fn test_capture_async_can_be_cancelled() {
    let cloud = MockCloud::start().await;
    cloud.route("PUT", "instances/vm-1", 200, CAPTURED);
    cloud.route("GET", "offerings/image/img-9", 200, &image("img-9", "0"));

    let client = cloud.client().with_poll_interval(Duration::from_secs(60));
    let task = client.image().capture_async("vm-1", "snapshot", "nightly");

    tokio::time::sleep(Duration::from_millis(100)).await;
    task.cancel();

    let err = tokio::time::timeout(Duration::from_secs(5), task.wait())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, SceError::Cancelled(_)));
}

#[tokio::test]
async fn test_capture_without_image_in_response_fails() {
    let cloud = MockCloud::start().await;
    cloud.route("PUT", "instances/vm-1", 200, "<SaveInstanceResponse/>");

    let err = cloud
        .client()
        .image()
        .capture("vm-1", "snapshot", "nightly")
        .await
        .unwrap_err();
    assert!(matches!(err, SceError::Cloud(_)));
}

#[tokio::test]
async fn test_visibility_and_unsupported_operations() {
    let cloud = MockCloud::start().await;
    cloud.route(
        "GET",
        "offerings/image/img-2",
        200,
        "<R><Image><ID>img-2</ID><Location>41</Location><Visibility>PUBLIC</Visibility></Image></R>",
    );
    cloud.route(
        "GET",
        "offerings/image/img-1",
        200,
        "<R><Image><ID>img-1</ID><Location>41</Location><Visibility>PRIVATE</Visibility></Image></R>",
    );
    cloud.route("DELETE", "offerings/image/img-1", 200, "");
    let client = cloud.client();
    let images = client.image();

    assert!(images.is_shared_with_public("img-2").await.unwrap());
    assert!(!images.is_shared_with_public("img-1").await.unwrap());
    assert!(!images.is_shared_with_public("img-x").await.unwrap());
    assert!(images.list_shares("img-1").await.unwrap().is_empty());

    images.remove("img-1").await.unwrap();
    assert_eq!(cloud.count("DELETE", "offerings/image/img-1"), 1);

    assert!(matches!(
        images.share("img-1", "20099999", true).await,
        Err(SceError::Unsupported(_))
    ));
    assert!(matches!(
        images.download("img-1").await,
        Err(SceError::Unsupported(_))
    ));
}
