//! Interface of the deployed Hem escrow contract

use alloy_sol_types::sol;

sol! {
    #[sol(all_derives)]
    #[derive(Debug, PartialEq, Eq)]
    contract Hem {
        constructor(address nftValidator, uint256 tinybarPerCent, bool testMode);

        function setTinybarPerCent(uint256 tinybarPerCent) external;
        function getTinybarPerCent() external view returns (uint256 tinybarPerCent);

        function whitelist_list(address seller, address[] memory tokens, int64[] memory serials, uint256[] memory prices) external;
        function list_offset(address seller, address[] memory tokens, int64[] memory serials, uint256[] memory prices) external;
        function whitelist_purchase(address buyer, address[] memory tokens, int64[] memory serials) external;
        function purchase_offset(address buyer, address[] memory tokens, int64[] memory serials) external payable;

        function getOffset(address token, int64 serial) external view returns (address seller, uint256 price, bool hemApproved, bool userApproved);
        function getPurchaseWhitelist(address token, int64 serial) external view returns (address buyer, uint256 price, bool hemApproved);
        function getPendingListings(address seller) external view returns (bytes32[] memory pending);
        function getPendingPurchases(address buyer) external view returns (bytes32[] memory pending);

        function associateOffsets(address[] memory tokens) external;
    }
}
